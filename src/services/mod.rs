//! GATT service objects.
//!
//! [`GattService`] is the single service implementation. It combines a
//! [`CharacteristicResolver`] with the codec markers from [`crate::protocol`]
//! and keeps the last raw value and notification flag of every resolved
//! characteristic. The typed facades in the submodules only add named
//! accessors on top of it.
//!
//! Service objects live for one connection session. A disconnect
//! invalidates them; the next successful service discovery builds new ones.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::ble::radio::{CharacteristicHandle, PeripheralId, Radio};
use crate::ble::resolver::CharacteristicResolver;
use crate::ble::uuids::ServiceKind;
use crate::error::{Error, Result};
use crate::peripheral::CallbackHandle;
use crate::protocol::CharacteristicCodec;

pub mod battery;
pub mod configuration;
pub mod environment;
pub mod motion;
pub mod ui;

pub use battery::BatteryService;
pub use configuration::ConfigurationService;
pub use environment::EnvironmentService;
pub use motion::MotionService;
pub use ui::UiService;

/// A raw characteristic value received from a peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicUpdate {
    /// Service the characteristic belongs to.
    pub service: ServiceKind,
    /// Characteristic UUID.
    pub characteristic: Uuid,
    /// Raw bytes as received.
    pub value: Vec<u8>,
}

impl CharacteristicUpdate {
    /// Decode the value if it belongs to the characteristic `C`.
    pub fn decode<C: CharacteristicCodec>(&self) -> Option<C::Value> {
        if self.service != C::SERVICE || self.characteristic != C::UUID {
            return None;
        }
        C::decode(&self.value)
    }
}

/// Cached state of one resolved characteristic.
#[derive(Debug, Clone)]
struct CharacteristicRef {
    handle: CharacteristicHandle,
    /// Last raw value; `None` until the first read or notification.
    value: Option<Vec<u8>>,
    /// Last acknowledged notification subscription state.
    notifying: bool,
}

struct ServiceState {
    valid: bool,
    resolver: CharacteristicResolver,
    characteristics: HashMap<Uuid, CharacteristicRef>,
}

/// A discovered GATT service on a connected peripheral.
#[derive(Clone)]
pub struct GattService {
    kind: ServiceKind,
    peripheral: PeripheralId,
    radio: Arc<dyn Radio>,
    state: Arc<RwLock<ServiceState>>,
    updates_tx: broadcast::Sender<CharacteristicUpdate>,
    callback_counter: Arc<AtomicU64>,
}

impl GattService {
    /// Build a service from the characteristics found during discovery.
    pub(crate) fn new(
        kind: ServiceKind,
        peripheral: PeripheralId,
        radio: Arc<dyn Radio>,
        discovered: &[Uuid],
        updates_tx: broadcast::Sender<CharacteristicUpdate>,
        callback_counter: Arc<AtomicU64>,
    ) -> Self {
        let resolver = CharacteristicResolver::new(kind, discovered);
        let characteristics = resolver
            .handles()
            .map(|handle| {
                (
                    handle.characteristic,
                    CharacteristicRef {
                        handle,
                        value: None,
                        notifying: false,
                    },
                )
            })
            .collect();

        Self {
            kind,
            peripheral,
            radio,
            state: Arc::new(RwLock::new(ServiceState {
                valid: true,
                resolver,
                characteristics,
            })),
            updates_tx,
            callback_counter,
        }
    }

    /// Which service this is.
    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    /// Identifier of the owning peripheral.
    pub fn peripheral_id(&self) -> PeripheralId {
        self.peripheral
    }

    /// Whether this object still belongs to a live connection session.
    pub fn is_valid(&self) -> bool {
        self.state.read().valid
    }

    /// Whether the firmware exposed characteristic `C`.
    pub fn is_discovered<C: CharacteristicCodec>(&self) -> bool {
        self.state.read().resolver.resolve(&C::UUID).is_some()
    }

    /// Names of well-known characteristics the firmware did not expose.
    pub fn missing_characteristics(&self) -> Vec<&'static str> {
        self.state.read().resolver.missing()
    }

    fn handle<C: CharacteristicCodec>(&self) -> Result<CharacteristicHandle> {
        debug_assert_eq!(C::SERVICE, self.kind);
        let state = self.state.read();
        if !state.valid {
            return Err(Error::ServiceInvalidated {
                name: self.kind.name(),
            });
        }
        state.resolver.require(&C::UUID, C::NAME)
    }

    /// Last raw value of characteristic `C`; `None` if never read.
    pub fn raw_value<C: CharacteristicCodec>(&self) -> Result<Option<Vec<u8>>> {
        self.handle::<C>()?;
        Ok(self
            .state
            .read()
            .characteristics
            .get(&C::UUID)
            .and_then(|characteristic| characteristic.value.clone()))
    }

    /// Last decoded value of characteristic `C`.
    ///
    /// `None` if the value was never read or could not be decoded.
    pub fn value<C: CharacteristicCodec>(&self) -> Result<Option<C::Value>> {
        let Some(raw) = self.raw_value::<C>()? else {
            return Ok(None);
        };
        let value = C::decode(&raw);
        if value.is_none() {
            debug!(
                "{}: malformed {} value {:02X?}",
                self.peripheral, C::NAME, raw
            );
        }
        Ok(value)
    }

    /// Last decoded value of characteristic `C`, or its default.
    pub fn value_or_default<C>(&self) -> Result<C::Value>
    where
        C: CharacteristicCodec,
        C::Value: Default,
    {
        Ok(self.value::<C>()?.unwrap_or_default())
    }

    /// Validate and write a value to characteristic `C`.
    ///
    /// Validation errors are returned before anything is sent to the radio.
    /// The written bytes become the cached value once the request is issued.
    pub fn write<C: CharacteristicCodec>(&self, value: &C::Value) -> Result<()> {
        let handle = self.handle::<C>()?;
        let bytes = C::encode(value)?;
        trace!("{}: writing {} {:02X?}", self.peripheral, C::NAME, bytes);

        self.radio.write(self.peripheral, handle, &bytes, true)?;
        self.store_value(&C::UUID, bytes);
        Ok(())
    }

    /// Request a fresh read of characteristic `C`.
    ///
    /// The result arrives as a value update.
    pub fn refresh<C: CharacteristicCodec>(&self) -> Result<()> {
        let handle = self.handle::<C>()?;
        self.radio.read(self.peripheral, handle)
    }

    /// Request a read of every resolved characteristic.
    pub fn refresh_all(&self) -> Result<()> {
        let handles: Vec<_> = {
            let state = self.state.read();
            if !state.valid {
                return Err(Error::ServiceInvalidated {
                    name: self.kind.name(),
                });
            }
            state.resolver.handles().collect()
        };
        for handle in handles {
            self.radio.read(self.peripheral, handle)?;
        }
        Ok(())
    }

    /// Subscribe to notifications of characteristic `C`.
    pub fn start_notifications<C: CharacteristicCodec>(&self) -> Result<()> {
        let handle = self.handle::<C>()?;
        self.radio.set_notify(self.peripheral, handle, true)
    }

    /// Unsubscribe from notifications of characteristic `C`.
    pub fn stop_notifications<C: CharacteristicCodec>(&self) -> Result<()> {
        let handle = self.handle::<C>()?;
        self.radio.set_notify(self.peripheral, handle, false)
    }

    /// Whether the peripheral acknowledged a notification subscription for
    /// `C`. Unresolved characteristics report `false`.
    pub fn notifications_enabled<C: CharacteristicCodec>(&self) -> bool {
        self.state
            .read()
            .characteristics
            .get(&C::UUID)
            .map(|characteristic| characteristic.notifying)
            .unwrap_or(false)
    }

    /// Subscribe to raw updates of every characteristic on the peripheral.
    pub fn subscribe(&self) -> broadcast::Receiver<CharacteristicUpdate> {
        self.updates_tx.subscribe()
    }

    /// Register a typed callback for values of characteristic `C`.
    ///
    /// Malformed payloads are skipped.
    pub fn on_update<C, F>(&self, callback: F) -> CallbackHandle
    where
        C: CharacteristicCodec,
        F: Fn(C::Value) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.updates_tx.subscribe();

        let handle = tokio::spawn(async move {
            while let Ok(update) = rx.recv().await {
                if let Some(value) = update.decode::<C>() {
                    callback(value);
                }
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }

    /// Mark the service unusable after the connection session ended.
    pub(crate) fn invalidate(&self) {
        let mut state = self.state.write();
        state.valid = false;
        for characteristic in state.characteristics.values_mut() {
            characteristic.notifying = false;
        }
    }

    /// Cache a raw value. Returns `false` for characteristics this service
    /// did not resolve.
    pub(crate) fn store_value(&self, characteristic: &Uuid, value: Vec<u8>) -> bool {
        match self.state.write().characteristics.get_mut(characteristic) {
            Some(entry) => {
                entry.value = Some(value);
                true
            }
            None => false,
        }
    }

    pub(crate) fn set_notifying(&self, characteristic: &Uuid, enabled: bool) {
        if let Some(entry) = self.state.write().characteristics.get_mut(characteristic) {
            entry.notifying = enabled;
        }
    }

    /// Read a characteristic back after a failed write.
    pub(crate) fn resync(&self, characteristic: &Uuid) {
        let handle = {
            let state = self.state.read();
            if !state.valid {
                return;
            }
            match state.characteristics.get(characteristic) {
                Some(entry) => entry.handle,
                None => return,
            }
        };
        if let Err(e) = self.radio.read(self.peripheral, handle) {
            warn!("{}: failed to resync {}: {}", self.peripheral, characteristic, e);
        }
    }
}

impl std::fmt::Debug for GattService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GattService")
            .field("kind", &self.kind)
            .field("peripheral", &self.peripheral)
            .field("valid", &self.is_valid())
            .finish()
    }
}
