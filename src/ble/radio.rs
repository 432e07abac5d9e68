//! The radio capability.
//!
//! The core never talks to a BLE stack directly. It issues requests through
//! the [`Radio`] trait and learns about their outcomes from [`RadioEvent`]s,
//! which the radio delivers serially to the device manager.

use uuid::Uuid;

use crate::error::Result;

/// Platform-level unique identifier of a peripheral.
pub type PeripheralId = Uuid;

/// Power/authorization state of the local radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RadioState {
    /// State not yet known.
    #[default]
    Unknown,
    /// The radio is resetting.
    Resetting,
    /// BLE is not supported on this host.
    Unsupported,
    /// The application is not allowed to use BLE.
    Unauthorized,
    /// The radio is switched off.
    PoweredOff,
    /// The radio is on and usable.
    PoweredOn,
}

impl RadioState {
    /// Check if the radio can be used.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::PoweredOn)
    }
}

/// A peripheral handle as returned by the radio.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KnownPeripheral {
    /// Platform identifier.
    pub id: PeripheralId,
    /// Advertised or cached name, if any.
    pub name: Option<String>,
}

impl KnownPeripheral {
    /// Create a new handle.
    pub fn new(id: PeripheralId, name: Option<String>) -> Self {
        Self { id, name }
    }
}

/// Advertisement payload seen while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Advertisement {
    /// Advertised local name.
    pub local_name: Option<String>,
    /// Raw manufacturer specific data, including the 2-byte company identifier.
    pub manufacturer_data: Option<Vec<u8>>,
    /// Advertised service UUIDs.
    pub service_uuids: Vec<Uuid>,
}

/// Address of a characteristic on a connected peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    /// UUID of the owning service.
    pub service: Uuid,
    /// UUID of the characteristic.
    pub characteristic: Uuid,
}

impl CharacteristicHandle {
    /// Create a new handle.
    pub fn new(service: Uuid, characteristic: Uuid) -> Self {
        Self {
            service,
            characteristic,
        }
    }
}

/// A service found during service discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    /// Service UUID.
    pub uuid: Uuid,
    /// UUIDs of the characteristics exposed by the firmware.
    pub characteristics: Vec<Uuid>,
}

/// Asynchronous outcome delivered by the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// The radio changed power/authorization state.
    StateChanged(RadioState),
    /// An advertisement was received while scanning.
    PeripheralDiscovered {
        /// The advertising peripheral.
        peripheral: KnownPeripheral,
        /// Advertisement payload.
        advertisement: Advertisement,
        /// Signal strength in dBm.
        rssi: Option<i16>,
    },
    /// A connection request succeeded.
    Connected(PeripheralId),
    /// A connection request failed.
    FailedToConnect {
        /// The peripheral.
        peripheral: PeripheralId,
        /// Description of the failure.
        error: String,
    },
    /// The link went down, either requested or unexpectedly.
    Disconnected {
        /// The peripheral.
        peripheral: PeripheralId,
        /// Set when the disconnect was not requested.
        error: Option<String>,
    },
    /// Services and their characteristics were discovered.
    ServicesDiscovered {
        /// The peripheral.
        peripheral: PeripheralId,
        /// Discovered services.
        services: Vec<DiscoveredService>,
    },
    /// Service discovery failed.
    ServiceDiscoveryFailed {
        /// The peripheral.
        peripheral: PeripheralId,
        /// Description of the failure.
        error: String,
    },
    /// A characteristic value was read or notified.
    CharacteristicValueUpdated {
        /// The peripheral.
        peripheral: PeripheralId,
        /// The characteristic.
        characteristic: CharacteristicHandle,
        /// New raw value.
        value: Vec<u8>,
    },
    /// A write request was acknowledged.
    WriteCompleted {
        /// The peripheral.
        peripheral: PeripheralId,
        /// The characteristic.
        characteristic: CharacteristicHandle,
        /// Set when the write failed.
        error: Option<String>,
    },
    /// A subscription change was acknowledged.
    NotificationStateChanged {
        /// The peripheral.
        peripheral: PeripheralId,
        /// The characteristic.
        characteristic: CharacteristicHandle,
        /// Whether notifications are now enabled.
        enabled: bool,
        /// Set when the change failed.
        error: Option<String>,
    },
}

impl RadioEvent {
    /// The peripheral this event concerns, if any.
    pub fn peripheral_id(&self) -> Option<PeripheralId> {
        match self {
            Self::StateChanged(_) => None,
            Self::PeripheralDiscovered { peripheral, .. } => Some(peripheral.id),
            Self::Connected(peripheral) => Some(*peripheral),
            Self::FailedToConnect { peripheral, .. }
            | Self::Disconnected { peripheral, .. }
            | Self::ServicesDiscovered { peripheral, .. }
            | Self::ServiceDiscoveryFailed { peripheral, .. }
            | Self::CharacteristicValueUpdated { peripheral, .. }
            | Self::WriteCompleted { peripheral, .. }
            | Self::NotificationStateChanged { peripheral, .. } => Some(*peripheral),
        }
    }
}

/// Requests the core can issue to a BLE stack.
///
/// Every method only starts an operation. Completion is reported later as a
/// [`RadioEvent`]; an `Err` means the request could not even be issued.
#[cfg_attr(test, mockall::automock)]
pub trait Radio: Send + Sync {
    /// Start scanning for peripherals advertising any of `services`.
    fn scan(&self, services: &[Uuid], allow_duplicates: bool) -> Result<()>;

    /// Stop scanning.
    fn stop_scan(&self) -> Result<()>;

    /// Connect to a peripheral.
    fn connect(&self, peripheral: PeripheralId) -> Result<()>;

    /// Cancel a pending or established connection.
    fn cancel_connection(&self, peripheral: PeripheralId) -> Result<()>;

    /// Resolve identifiers remembered from earlier sessions. Unknown identifiers are omitted.
    fn retrieve_known(&self, identifiers: &[PeripheralId]) -> Vec<KnownPeripheral>;

    /// Discover `services` and their characteristics on a connected peripheral.
    fn discover_services(&self, peripheral: PeripheralId, services: &[Uuid]) -> Result<()>;

    /// Read a characteristic value.
    fn read(&self, peripheral: PeripheralId, characteristic: CharacteristicHandle) -> Result<()>;

    /// Write a characteristic value.
    fn write(
        &self,
        peripheral: PeripheralId,
        characteristic: CharacteristicHandle,
        value: &[u8],
        with_response: bool,
    ) -> Result<()>;

    /// Enable or disable notifications.
    fn set_notify(
        &self,
        peripheral: PeripheralId,
        characteristic: CharacteristicHandle,
        enabled: bool,
    ) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    //! A radio that records every request for later inspection.

    use parking_lot::Mutex;

    use super::*;

    /// A request issued to the [`RecordingRadio`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum RadioCall {
        Scan {
            services: Vec<Uuid>,
            allow_duplicates: bool,
        },
        StopScan,
        Connect(PeripheralId),
        CancelConnection(PeripheralId),
        DiscoverServices(PeripheralId),
        Read(CharacteristicHandle),
        Write {
            characteristic: CharacteristicHandle,
            value: Vec<u8>,
        },
        SetNotify(CharacteristicHandle, bool),
    }

    #[derive(Default)]
    pub(crate) struct RecordingRadio {
        calls: Mutex<Vec<RadioCall>>,
        known: Mutex<Vec<KnownPeripheral>>,
    }

    impl RecordingRadio {
        pub(crate) fn with_known(known: Vec<KnownPeripheral>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                known: Mutex::new(known),
            }
        }

        pub(crate) fn calls(&self) -> Vec<RadioCall> {
            self.calls.lock().clone()
        }

        pub(crate) fn count(&self, predicate: impl Fn(&RadioCall) -> bool) -> usize {
            self.calls.lock().iter().filter(|call| predicate(call)).count()
        }

        pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
            self.calls
                .lock()
                .iter()
                .filter_map(|call| match call {
                    RadioCall::Write { value, .. } => Some(value.clone()),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, call: RadioCall) -> Result<()> {
            self.calls.lock().push(call);
            Ok(())
        }
    }

    impl Radio for RecordingRadio {
        fn scan(&self, services: &[Uuid], allow_duplicates: bool) -> Result<()> {
            self.record(RadioCall::Scan {
                services: services.to_vec(),
                allow_duplicates,
            })
        }

        fn stop_scan(&self) -> Result<()> {
            self.record(RadioCall::StopScan)
        }

        fn connect(&self, peripheral: PeripheralId) -> Result<()> {
            self.record(RadioCall::Connect(peripheral))
        }

        fn cancel_connection(&self, peripheral: PeripheralId) -> Result<()> {
            self.record(RadioCall::CancelConnection(peripheral))
        }

        fn retrieve_known(&self, identifiers: &[PeripheralId]) -> Vec<KnownPeripheral> {
            self.known
                .lock()
                .iter()
                .filter(|known| identifiers.contains(&known.id))
                .cloned()
                .collect()
        }

        fn discover_services(&self, peripheral: PeripheralId, _services: &[Uuid]) -> Result<()> {
            self.record(RadioCall::DiscoverServices(peripheral))
        }

        fn read(&self, _peripheral: PeripheralId, characteristic: CharacteristicHandle) -> Result<()> {
            self.record(RadioCall::Read(characteristic))
        }

        fn write(
            &self,
            _peripheral: PeripheralId,
            characteristic: CharacteristicHandle,
            value: &[u8],
            _with_response: bool,
        ) -> Result<()> {
            self.record(RadioCall::Write {
                characteristic,
                value: value.to_vec(),
            })
        }

        fn set_notify(
            &self,
            _peripheral: PeripheralId,
            characteristic: CharacteristicHandle,
            enabled: bool,
        ) -> Result<()> {
            self.record(RadioCall::SetNotify(characteristic, enabled))
        }
    }
}
