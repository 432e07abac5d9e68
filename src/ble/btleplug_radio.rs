//! [`Radio`] implementation on top of btleplug.
//!
//! Each request is started on a spawned task and its outcome is sent back as
//! a [`RadioEvent`] on the channel given to [`BtleplugRadio::new`].

use btleplug::api::{
    Central, CentralEvent, CentralState, Characteristic, Manager as _, Peripheral as _, ScanFilter,
    WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::ble::radio::{
    Advertisement, CharacteristicHandle, DiscoveredService, KnownPeripheral, PeripheralId, Radio,
    RadioEvent, RadioState,
};
use crate::error::{Error, Result};

/// Namespace for deriving stable identifiers from platform peripheral ids.
const PERIPHERAL_NAMESPACE: Uuid = Uuid::from_u128(0x5c2f_71a0_3d8e_4b6a_9f41_0e8d_2b7c_6a13);

/// Company identifier used when a peripheral advertises several.
const NORDIC_COMPANY_ID: u16 = 0x0059;

/// Map a platform peripheral id to a [`PeripheralId`].
pub fn peripheral_id(id: &btleplug::platform::PeripheralId) -> PeripheralId {
    Uuid::new_v5(&PERIPHERAL_NAMESPACE, id.to_string().as_bytes())
}

/// A peripheral handle known to the adapter.
#[derive(Clone)]
struct CachedPeripheral {
    peripheral: Peripheral,
    name: Option<String>,
}

/// State shared with the spawned tasks.
struct Shared {
    adapter: Adapter,
    events_tx: mpsc::UnboundedSender<RadioEvent>,
    peripherals: RwLock<HashMap<PeripheralId, CachedPeripheral>>,
    /// Active scan filter, `None` while not scanning.
    scan_filter: RwLock<Option<Vec<Uuid>>>,
    allow_duplicates: RwLock<bool>,
    /// Peripherals already reported during the current scan.
    reported: RwLock<HashSet<PeripheralId>>,
    connected: RwLock<HashSet<PeripheralId>>,
    /// Peripherals with a disconnect we asked for.
    disconnecting: RwLock<HashSet<PeripheralId>>,
}

impl Shared {
    fn send(&self, event: RadioEvent) {
        if self.events_tx.send(event).is_err() {
            trace!("Radio event receiver dropped");
        }
    }

    fn cached(&self, id: PeripheralId) -> Result<Peripheral> {
        self.peripherals
            .read()
            .get(&id)
            .map(|cached| cached.peripheral.clone())
            .ok_or_else(|| Error::PeripheralNotFound {
                identifier: id.to_string(),
            })
    }

    /// The link went down without being asked to.
    fn link_lost(&self, id: PeripheralId) {
        if self.disconnecting.read().contains(&id) {
            return;
        }
        if self.connected.write().remove(&id) {
            self.send(RadioEvent::Disconnected {
                peripheral: id,
                error: Some("connection lost".to_string()),
            });
        }
    }

    /// A requested disconnect finished.
    fn disconnect_finished(&self, id: PeripheralId, error: Option<String>) {
        self.connected.write().remove(&id);
        if self.disconnecting.write().remove(&id) {
            self.send(RadioEvent::Disconnected {
                peripheral: id,
                error,
            });
        }
    }
}

/// Radio backed by the first Bluetooth adapter btleplug reports.
pub struct BtleplugRadio {
    shared: Arc<Shared>,
    runtime: Handle,
    /// Adapter event task.
    events_handle: tokio::task::JoinHandle<()>,
    /// Notification listener tasks, per connected peripheral.
    listeners: Arc<RwLock<HashMap<PeripheralId, tokio::task::JoinHandle<()>>>>,
}

impl BtleplugRadio {
    /// Open the first adapter and start listening for its events.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new(events_tx: mpsc::UnboundedSender<RadioEvent>) -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        let shared = Arc::new(Shared {
            adapter: adapter.clone(),
            events_tx,
            peripherals: RwLock::new(HashMap::new()),
            scan_filter: RwLock::new(None),
            allow_duplicates: RwLock::new(false),
            reported: RwLock::new(HashSet::new()),
            connected: RwLock::new(HashSet::new()),
            disconnecting: RwLock::new(HashSet::new()),
        });

        // Peripherals the platform remembers from earlier sessions.
        for peripheral in adapter.peripherals().await.map_err(Error::Bluetooth)? {
            let name = match peripheral.properties().await {
                Ok(Some(properties)) => properties.local_name,
                _ => None,
            };
            shared.peripherals.write().insert(
                peripheral_id(&peripheral.id()),
                CachedPeripheral { peripheral, name },
            );
        }
        debug!("{} peripherals known to the adapter", shared.peripherals.read().len());

        let mut events = adapter.events().await.map_err(Error::Bluetooth)?;
        let task_shared = shared.clone();
        let events_handle = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                Self::handle_event(&task_shared, event).await;
            }
            debug!("Adapter event stream ended");
        });

        shared.send(RadioEvent::StateChanged(RadioState::PoweredOn));

        Ok(Self {
            shared,
            runtime: Handle::current(),
            events_handle,
            listeners: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Get the underlying adapter.
    pub fn adapter(&self) -> &Adapter {
        &self.shared.adapter
    }

    async fn handle_event(shared: &Shared, event: CentralEvent) {
        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                trace!("Device seen: {:?}", id);
                Self::process_advertisement(shared, id).await;
            }
            CentralEvent::ManufacturerDataAdvertisement { id, .. }
            | CentralEvent::ServicesAdvertisement { id, .. } => {
                Self::process_advertisement(shared, id).await;
            }
            CentralEvent::DeviceDisconnected(id) => {
                debug!("Device disconnected: {:?}", id);
                shared.link_lost(peripheral_id(&id));
            }
            CentralEvent::StateUpdate(state) => {
                let state = match state {
                    CentralState::PoweredOn => RadioState::PoweredOn,
                    CentralState::PoweredOff => RadioState::PoweredOff,
                    _ => RadioState::Unknown,
                };
                shared.send(RadioEvent::StateChanged(state));
            }
            _ => {}
        }
    }

    async fn process_advertisement(shared: &Shared, id: btleplug::platform::PeripheralId) {
        let Some(filter) = shared.scan_filter.read().clone() else {
            return;
        };

        let peripheral = match shared.adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return,
        };

        if !filter.is_empty() && !properties.services.iter().any(|s| filter.contains(s)) {
            return;
        }

        let known = KnownPeripheral::new(peripheral_id(&id), properties.local_name.clone());
        shared.peripherals.write().insert(
            known.id,
            CachedPeripheral {
                peripheral,
                name: known.name.clone(),
            },
        );

        let first = shared.reported.write().insert(known.id);
        if !first && !*shared.allow_duplicates.read() {
            return;
        }

        let manufacturer_data = properties
            .manufacturer_data
            .get(&NORDIC_COMPANY_ID)
            .map(|data| (NORDIC_COMPANY_ID, data))
            .or_else(|| properties.manufacturer_data.iter().next().map(|(k, v)| (*k, v)))
            .map(|(company, data)| {
                let mut raw = company.to_le_bytes().to_vec();
                raw.extend_from_slice(data);
                raw
            });

        shared.send(RadioEvent::PeripheralDiscovered {
            peripheral: known,
            advertisement: Advertisement {
                local_name: properties.local_name,
                manufacturer_data,
                service_uuids: properties.services,
            },
            rssi: properties.rssi,
        });
    }

    fn characteristic(peripheral: &Peripheral, handle: CharacteristicHandle) -> Result<Characteristic> {
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == handle.characteristic && c.service_uuid == handle.service)
            .ok_or_else(|| {
                Error::Internal(format!(
                    "characteristic {} not discovered",
                    handle.characteristic
                ))
            })
    }

    /// Forward notifications of a connected peripheral as value updates.
    async fn start_listener(
        shared: &Arc<Shared>,
        listeners: &RwLock<HashMap<PeripheralId, tokio::task::JoinHandle<()>>>,
        id: PeripheralId,
        peripheral: Peripheral,
    ) {
        let mut notifications = match peripheral.notifications().await {
            Ok(n) => n,
            Err(e) => {
                error!("Failed to get notifications stream: {}", e);
                return;
            }
        };

        let shared = shared.clone();
        let handle = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                let service = peripheral
                    .characteristics()
                    .into_iter()
                    .find(|c| c.uuid == notification.uuid)
                    .map(|c| c.service_uuid);
                let Some(service) = service else {
                    trace!("Notification from unknown characteristic {}", notification.uuid);
                    continue;
                };
                shared.send(RadioEvent::CharacteristicValueUpdated {
                    peripheral: id,
                    characteristic: CharacteristicHandle::new(service, notification.uuid),
                    value: notification.value,
                });
            }
            debug!("Notification listener for {} stopped", id);
        });

        if let Some(previous) = listeners.write().insert(id, handle) {
            previous.abort();
        }
    }
}

impl Radio for BtleplugRadio {
    fn scan(&self, services: &[Uuid], allow_duplicates: bool) -> Result<()> {
        info!("Starting BLE scan for {} service signatures", services.len());

        *self.shared.allow_duplicates.write() = allow_duplicates;
        self.shared.reported.write().clear();
        *self.shared.scan_filter.write() = Some(services.to_vec());

        let shared = self.shared.clone();
        let filter = ScanFilter {
            services: services.to_vec(),
        };
        self.runtime.spawn(async move {
            if let Err(e) = shared.adapter.start_scan(filter).await {
                error!("Failed to start scan: {}", e);
                *shared.scan_filter.write() = None;
            }
        });
        Ok(())
    }

    fn stop_scan(&self) -> Result<()> {
        info!("Stopping BLE scan");

        *self.shared.scan_filter.write() = None;

        let shared = self.shared.clone();
        self.runtime.spawn(async move {
            if let Err(e) = shared.adapter.stop_scan().await {
                warn!("Failed to stop scan: {}", e);
            }
        });
        Ok(())
    }

    fn connect(&self, id: PeripheralId) -> Result<()> {
        let peripheral = self.shared.cached(id)?;
        let shared = self.shared.clone();
        let listeners = self.listeners.clone();

        self.runtime.spawn(async move {
            match peripheral.connect().await {
                Ok(()) => {
                    info!("Connected to {}", id);
                    shared.connected.write().insert(id);
                    Self::start_listener(&shared, &listeners, id, peripheral).await;
                    shared.send(RadioEvent::Connected(id));
                }
                Err(e) => {
                    warn!("Failed to connect to {}: {}", id, e);
                    shared.send(RadioEvent::FailedToConnect {
                        peripheral: id,
                        error: e.to_string(),
                    });
                }
            }
        });
        Ok(())
    }

    fn cancel_connection(&self, id: PeripheralId) -> Result<()> {
        let peripheral = self.shared.cached(id)?;
        self.shared.disconnecting.write().insert(id);
        if let Some(listener) = self.listeners.write().remove(&id) {
            listener.abort();
        }

        let shared = self.shared.clone();
        self.runtime.spawn(async move {
            let result = peripheral.disconnect().await;
            if let Err(e) = &result {
                warn!("Failed to disconnect from {}: {}", id, e);
            }
            shared.disconnect_finished(id, result.err().map(|e| e.to_string()));
        });
        Ok(())
    }

    fn retrieve_known(&self, identifiers: &[PeripheralId]) -> Vec<KnownPeripheral> {
        let peripherals = self.shared.peripherals.read();
        identifiers
            .iter()
            .filter_map(|id| {
                peripherals
                    .get(id)
                    .map(|cached| KnownPeripheral::new(*id, cached.name.clone()))
            })
            .collect()
    }

    fn discover_services(&self, id: PeripheralId, services: &[Uuid]) -> Result<()> {
        let peripheral = self.shared.cached(id)?;
        let shared = self.shared.clone();
        let wanted = services.to_vec();

        self.runtime.spawn(async move {
            if let Err(e) = peripheral.discover_services().await {
                shared.send(RadioEvent::ServiceDiscoveryFailed {
                    peripheral: id,
                    error: e.to_string(),
                });
                return;
            }

            let services: Vec<_> = peripheral
                .services()
                .into_iter()
                .filter(|service| wanted.contains(&service.uuid))
                .map(|service| DiscoveredService {
                    uuid: service.uuid,
                    characteristics: service.characteristics.iter().map(|c| c.uuid).collect(),
                })
                .collect();
            debug!("Discovered {} services on {}", services.len(), id);

            shared.send(RadioEvent::ServicesDiscovered {
                peripheral: id,
                services,
            });
        });
        Ok(())
    }

    fn read(&self, id: PeripheralId, handle: CharacteristicHandle) -> Result<()> {
        let peripheral = self.shared.cached(id)?;
        let characteristic = Self::characteristic(&peripheral, handle)?;
        let shared = self.shared.clone();

        self.runtime.spawn(async move {
            match peripheral.read(&characteristic).await {
                Ok(value) => {
                    trace!("Read {} bytes from {}", value.len(), handle.characteristic);
                    shared.send(RadioEvent::CharacteristicValueUpdated {
                        peripheral: id,
                        characteristic: handle,
                        value,
                    });
                }
                Err(e) => warn!("Failed to read {}: {}", handle.characteristic, e),
            }
        });
        Ok(())
    }

    fn write(
        &self,
        id: PeripheralId,
        handle: CharacteristicHandle,
        value: &[u8],
        with_response: bool,
    ) -> Result<()> {
        let peripheral = self.shared.cached(id)?;
        let characteristic = Self::characteristic(&peripheral, handle)?;
        let shared = self.shared.clone();
        let value = value.to_vec();

        let write_type = if with_response {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };

        self.runtime.spawn(async move {
            let result = peripheral.write(&characteristic, &value, write_type).await;
            trace!("Wrote {} bytes to {}", value.len(), handle.characteristic);
            shared.send(RadioEvent::WriteCompleted {
                peripheral: id,
                characteristic: handle,
                error: result.err().map(|e| e.to_string()),
            });
        });
        Ok(())
    }

    fn set_notify(&self, id: PeripheralId, handle: CharacteristicHandle, enabled: bool) -> Result<()> {
        let peripheral = self.shared.cached(id)?;
        let characteristic = Self::characteristic(&peripheral, handle)?;
        let shared = self.shared.clone();

        self.runtime.spawn(async move {
            let result = if enabled {
                peripheral.subscribe(&characteristic).await
            } else {
                peripheral.unsubscribe(&characteristic).await
            };
            if let Err(e) = &result {
                debug!("Failed to change notifications on {}: {}", handle.characteristic, e);
            }
            shared.send(RadioEvent::NotificationStateChanged {
                peripheral: id,
                characteristic: handle,
                enabled,
                error: result.err().map(|e| e.to_string()),
            });
        });
        Ok(())
    }
}

impl Drop for BtleplugRadio {
    fn drop(&mut self) {
        self.events_handle.abort();
        for (_, listener) in self.listeners.write().drain() {
            listener.abort();
        }
    }
}
