//! Peripheral struct and methods.
//!
//! Represents a single Thingy device and tracks its connection lifecycle.
//! All state transitions are driven by the [`DeviceManager`] from radio
//! events or explicit connect/disconnect requests.
//!
//! [`DeviceManager`]: crate::DeviceManager

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use crate::ble::connection::PeripheralState;
use crate::ble::radio::{
    Advertisement, CharacteristicHandle, DiscoveredService, KnownPeripheral, PeripheralId, Radio,
};
use crate::ble::uuids::ServiceKind;
use crate::device_manager::DeviceEvent;
use crate::error::{Error, Result};
use crate::services::{
    BatteryService, CharacteristicUpdate, ConfigurationService, EnvironmentService, GattService,
    MotionService, UiService,
};

/// Callback handle for unregistering callbacks.
pub struct CallbackHandle {
    id: u64,
    unregister_fn: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl CallbackHandle {
    /// Create a new callback handle.
    pub(crate) fn new(id: u64, unregister_fn: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            unregister_fn: Some(Box::new(unregister_fn)),
        }
    }

    /// Unregister this callback.
    pub fn unregister(mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }

    /// Get the callback ID.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(f) = self.unregister_fn.take() {
            f();
        }
    }
}

/// Internal state for a peripheral.
struct PeripheralInner {
    /// Advertised or cached name.
    name: Option<String>,
    /// Tracked for reconnection and persisted.
    stored: bool,
    /// Connection state.
    state: PeripheralState,
    /// Service objects of the current connection session.
    services: HashMap<ServiceKind, GattService>,
    /// Last signal strength.
    rssi: Option<i16>,
    /// Pairing code from the last advertisement.
    pairing_code: Option<String>,
    /// Last time the device was heard from.
    last_seen: Option<DateTime<Utc>>,
    /// Error reported with the last failed connection or disconnect.
    last_error: Option<String>,
}

/// Represents a single Thingy peripheral.
pub struct Peripheral {
    /// Platform identifier.
    id: PeripheralId,
    /// Radio used for all requests.
    radio: Arc<dyn Radio>,
    /// Internal state.
    inner: RwLock<PeripheralInner>,
    /// Manager event channel.
    events_tx: broadcast::Sender<DeviceEvent>,
    /// Per-peripheral state channel.
    state_tx: broadcast::Sender<PeripheralState>,
    /// Raw characteristic update channel, shared by all sessions.
    updates_tx: broadcast::Sender<CharacteristicUpdate>,
    /// Callback ID counter.
    callback_counter: Arc<AtomicU64>,
}

impl Peripheral {
    /// Create a new peripheral instance.
    pub(crate) fn new(
        known: KnownPeripheral,
        radio: Arc<dyn Radio>,
        events_tx: broadcast::Sender<DeviceEvent>,
        update_capacity: usize,
    ) -> Self {
        let (state_tx, _) = broadcast::channel(16);
        let (updates_tx, _) = broadcast::channel(update_capacity);

        Self {
            id: known.id,
            radio,
            inner: RwLock::new(PeripheralInner {
                name: known.name,
                stored: false,
                state: PeripheralState::Disconnected,
                services: HashMap::new(),
                rssi: None,
                pairing_code: None,
                last_seen: None,
                last_error: None,
            }),
            events_tx,
            state_tx,
            updates_tx,
            callback_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    // === Identity ===

    /// Get the platform identifier.
    pub fn id(&self) -> PeripheralId {
        self.id
    }

    /// Get the device name, if known.
    pub fn name(&self) -> Option<String> {
        self.inner.read().name.clone()
    }

    /// Check if the peripheral is tracked for reconnection.
    pub fn is_stored(&self) -> bool {
        self.inner.read().stored
    }

    pub(crate) fn set_stored(&self, stored: bool) {
        self.inner.write().stored = stored;
    }

    /// Get the last signal strength.
    pub fn rssi(&self) -> Option<i16> {
        self.inner.read().rssi
    }

    /// Get the pairing code from the last advertisement.
    pub fn pairing_code(&self) -> Option<String> {
        self.inner.read().pairing_code.clone()
    }

    /// Get the last time the device was heard from.
    pub fn last_seen(&self) -> Option<DateTime<Utc>> {
        self.inner.read().last_seen
    }

    /// Get the error reported with the last failed connection or disconnect.
    pub fn last_error(&self) -> Option<String> {
        self.inner.read().last_error.clone()
    }

    // === Connection state ===

    /// Get the connection state.
    pub fn state(&self) -> PeripheralState {
        self.inner.read().state
    }

    /// Check if all services have been discovered.
    pub fn is_ready(&self) -> bool {
        self.state() == PeripheralState::Ready
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_state(&self) -> broadcast::Receiver<PeripheralState> {
        self.state_tx.subscribe()
    }

    /// Register a callback for connection state changes.
    pub fn on_state_changed<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(PeripheralState) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.state_tx.subscribe();

        let handle = tokio::spawn(async move {
            while let Ok(state) = rx.recv().await {
                callback(state);
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }

    /// Transition to `state`, notifying listeners if it changed.
    pub(crate) fn set_state(&self, state: PeripheralState) {
        let previous = std::mem::replace(&mut self.inner.write().state, state);
        if previous != state {
            info!("{}: {} -> {}", self.id, previous, state);
            self.emit_state(state);
        }
    }

    /// Notify listeners of the current state again.
    pub(crate) fn reemit_state(&self) {
        let state = self.state();
        debug!("{}: re-emitting {}", self.id, state);
        self.emit_state(state);
    }

    fn emit_state(&self, state: PeripheralState) {
        let _ = self.state_tx.send(state);
        let _ = self.events_tx.send(DeviceEvent::PeripheralStateChanged {
            peripheral: self.id,
            state,
        });
    }

    // === Services ===

    fn service(&self, kind: ServiceKind) -> Result<GattService> {
        let inner = self.inner.read();
        if inner.state != PeripheralState::Ready {
            return Err(Error::NotReady);
        }
        inner
            .services
            .get(&kind)
            .cloned()
            .ok_or(Error::ServiceNotFound { name: kind.name() })
    }

    /// Services found during the current connection session.
    pub fn discovered_services(&self) -> Vec<ServiceKind> {
        let inner = self.inner.read();
        ServiceKind::ALL
            .into_iter()
            .filter(|kind| inner.services.contains_key(kind))
            .collect()
    }

    pub fn battery_service(&self) -> Result<BatteryService> {
        self.service(ServiceKind::Battery).map(BatteryService::new)
    }

    pub fn configuration_service(&self) -> Result<ConfigurationService> {
        self.service(ServiceKind::Configuration)
            .map(ConfigurationService::new)
    }

    pub fn environment_service(&self) -> Result<EnvironmentService> {
        self.service(ServiceKind::Environment)
            .map(EnvironmentService::new)
    }

    pub fn motion_service(&self) -> Result<MotionService> {
        self.service(ServiceKind::Motion).map(MotionService::new)
    }

    pub fn ui_service(&self) -> Result<UiService> {
        self.service(ServiceKind::UserInterface).map(UiService::new)
    }

    /// Subscribe to raw characteristic updates across connection sessions.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<CharacteristicUpdate> {
        self.updates_tx.subscribe()
    }

    /// Register a callback for raw characteristic updates.
    pub fn on_characteristic_updated<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(&CharacteristicUpdate) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.updates_tx.subscribe();

        let handle = tokio::spawn(async move {
            while let Ok(update) = rx.recv().await {
                callback(&update);
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }

    // === Radio event handlers ===

    /// Update from an advertisement seen while scanning.
    pub(crate) fn update_from_advertisement(&self, advertisement: &Advertisement, rssi: Option<i16>) {
        let mut inner = self.inner.write();
        if let Some(name) = &advertisement.local_name {
            inner.name = Some(name.clone());
        }
        if let Some(code) = advertisement.pairing_code() {
            inner.pairing_code = Some(code);
        }
        if rssi.is_some() {
            inner.rssi = rssi;
        }
        inner.last_seen = Some(Utc::now());
    }

    /// Link established: discover the target services.
    pub(crate) fn handle_connected(&self) {
        match self.state() {
            PeripheralState::Connecting => {}
            PeripheralState::Disconnecting => {
                // The link came up after a disconnect was requested.
                debug!("{}: connected while disconnecting, cancelling again", self.id);
                if let Err(e) = self.radio.cancel_connection(self.id) {
                    warn!("{}: cancel connection failed: {}", self.id, e);
                }
                return;
            }
            state => {
                debug!("{}: ignoring connect in state {}", self.id, state);
                return;
            }
        }

        self.inner.write().last_error = None;
        self.set_state(PeripheralState::Connected);

        let targets: Vec<_> = ServiceKind::ALL.iter().map(ServiceKind::uuid).collect();
        if let Err(e) = self.radio.discover_services(self.id, &targets) {
            warn!("{}: service discovery request failed: {}", self.id, e);
            if let Err(e) = self.request_disconnect() {
                warn!("{}: cancel connection failed: {}", self.id, e);
            }
        }
    }

    pub(crate) fn handle_failed_to_connect(&self, error: String) {
        warn!("{}: failed to connect: {}", self.id, error);
        self.inner.write().last_error = Some(error);
        self.set_state(PeripheralState::FailedToConnect);
    }

    /// Link lost or closed: end the connection session.
    pub(crate) fn handle_disconnected(&self, error: Option<String>) {
        if let Some(error) = &error {
            warn!("{}: disconnected with error: {}", self.id, error);
        }
        {
            let mut inner = self.inner.write();
            if error.is_some() {
                inner.last_error = error;
            }
        }
        self.reset_session();
        self.set_state(PeripheralState::Disconnected);
    }

    /// Build service objects from a discovery result and become ready.
    pub(crate) fn handle_services_discovered(&self, discovered: &[DiscoveredService]) {
        if self.state() != PeripheralState::Connected {
            debug!(
                "{}: ignoring service discovery result in state {}",
                self.id,
                self.state()
            );
            return;
        }

        let services: HashMap<_, _> = discovered
            .iter()
            .filter_map(|service| {
                let kind = ServiceKind::from_uuid(&service.uuid)?;
                let object = GattService::new(
                    kind,
                    self.id,
                    self.radio.clone(),
                    &service.characteristics,
                    self.updates_tx.clone(),
                    self.callback_counter.clone(),
                );
                Some((kind, object))
            })
            .collect();

        for kind in ServiceKind::ALL {
            if !services.contains_key(&kind) {
                warn!("{}: {} service not found", self.id, kind);
            }
        }

        self.reset_session();
        self.inner.write().services = services;
        self.set_state(PeripheralState::Ready);
    }

    pub(crate) fn handle_service_discovery_failed(&self, error: String) {
        warn!("{}: service discovery failed: {}", self.id, error);
        self.inner.write().last_error = Some(error);
        if let Err(e) = self.request_disconnect() {
            warn!("{}: cancel connection failed: {}", self.id, e);
        }
    }

    /// Cache and publish a value read or notified by the peripheral.
    pub(crate) fn handle_value_updated(&self, characteristic: CharacteristicHandle, value: Vec<u8>) {
        let Some(kind) = ServiceKind::from_uuid(&characteristic.service) else {
            debug!(
                "{}: value for unknown service {}",
                self.id, characteristic.service
            );
            return;
        };
        trace!(
            "{}: {} {} = {:02X?}",
            self.id,
            kind,
            characteristic.characteristic,
            value
        );

        let stored = {
            let mut inner = self.inner.write();
            inner.last_seen = Some(Utc::now());
            inner
                .services
                .get(&kind)
                .filter(|service| service.is_valid())
                .map(|service| service.store_value(&characteristic.characteristic, value.clone()))
                .unwrap_or(false)
        };

        if !stored {
            debug!(
                "{}: dropping value for unresolved characteristic {}",
                self.id, characteristic.characteristic
            );
            return;
        }

        let _ = self.updates_tx.send(CharacteristicUpdate {
            service: kind,
            characteristic: characteristic.characteristic,
            value,
        });
    }

    /// A write was acknowledged. A failed write is read back so the cache
    /// matches the device again.
    pub(crate) fn handle_write_completed(
        &self,
        characteristic: CharacteristicHandle,
        error: Option<String>,
    ) {
        let Some(error) = error else {
            return;
        };
        warn!(
            "{}: write to {} failed: {}",
            self.id, characteristic.characteristic, error
        );
        if let Some(service) = self.session_service(&characteristic) {
            service.resync(&characteristic.characteristic);
        }
    }

    pub(crate) fn handle_notification_state(
        &self,
        characteristic: CharacteristicHandle,
        enabled: bool,
        error: Option<String>,
    ) {
        if let Some(error) = error {
            warn!(
                "{}: notification change on {} failed: {}",
                self.id, characteristic.characteristic, error
            );
            return;
        }
        if let Some(service) = self.session_service(&characteristic) {
            service.set_notifying(&characteristic.characteristic, enabled);
        }
    }

    fn session_service(&self, characteristic: &CharacteristicHandle) -> Option<GattService> {
        let kind = ServiceKind::from_uuid(&characteristic.service)?;
        self.inner.read().services.get(&kind).cloned()
    }

    /// Ask the radio to drop the link; the outcome arrives as a disconnect.
    pub(crate) fn request_disconnect(&self) -> Result<()> {
        self.set_state(PeripheralState::Disconnecting);
        self.radio.cancel_connection(self.id)
    }

    /// Force the end of a pending disconnect that will never be reported.
    pub(crate) fn force_disconnected(&self) {
        if self.state() == PeripheralState::Disconnecting {
            self.reset_session();
            self.set_state(PeripheralState::Disconnected);
        }
    }

    fn reset_session(&self) {
        let services = std::mem::take(&mut self.inner.write().services);
        for service in services.values() {
            service.invalidate();
        }
    }
}

impl std::fmt::Debug for Peripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Peripheral")
            .field("id", &self.id)
            .field("name", &inner.name)
            .field("stored", &inner.stored)
            .field("state", &inner.state)
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{all_services, peripheral};
    use super::*;
    use crate::ble::radio::testing::{RadioCall, RecordingRadio};
    use crate::ble::uuids::*;
    use pretty_assertions::assert_eq;

    fn ready(radio: &Arc<RecordingRadio>) -> Arc<Peripheral> {
        let (peripheral, _) = peripheral(radio.clone());
        peripheral.set_state(PeripheralState::Connecting);
        peripheral.handle_connected();
        peripheral.handle_services_discovered(&all_services());
        peripheral
    }

    #[test]
    fn test_connected_requests_service_discovery() {
        let radio = Arc::new(RecordingRadio::default());
        let (peripheral, mut events) = peripheral(radio.clone());

        peripheral.set_state(PeripheralState::Connecting);
        peripheral.handle_connected();

        assert_eq!(peripheral.state(), PeripheralState::Connected);
        assert_eq!(radio.calls(), vec![RadioCall::DiscoverServices(peripheral.id())]);
        assert!(matches!(peripheral.configuration_service(), Err(Error::NotReady)));

        let states: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|event| match event {
                DeviceEvent::PeripheralStateChanged { state, .. } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![PeripheralState::Connecting, PeripheralState::Connected]);
    }

    #[test]
    fn test_services_discovered_makes_ready() {
        let radio = Arc::new(RecordingRadio::default());
        let peripheral = ready(&radio);

        assert!(peripheral.is_ready());
        assert_eq!(peripheral.discovered_services().len(), 5);
        assert!(peripheral.configuration_service().is_ok());
        assert!(peripheral.battery_service().is_ok());
    }

    #[test]
    fn test_missing_service_is_named_error() {
        let radio = Arc::new(RecordingRadio::default());
        let (peripheral, _) = peripheral(radio);
        peripheral.set_state(PeripheralState::Connecting);
        peripheral.handle_connected();

        let services: Vec<_> = all_services()
            .into_iter()
            .filter(|service| service.uuid != MOTION_SERVICE_UUID)
            .collect();
        peripheral.handle_services_discovered(&services);

        assert!(peripheral.is_ready());
        assert!(matches!(
            peripheral.motion_service(),
            Err(Error::ServiceNotFound { name: "Motion" })
        ));
    }

    #[test]
    fn test_disconnect_invalidates_services() {
        let radio = Arc::new(RecordingRadio::default());
        let peripheral = ready(&radio);
        let environment = peripheral.environment_service().unwrap();

        peripheral.handle_disconnected(Some("link lost".to_string()));

        assert_eq!(peripheral.state(), PeripheralState::Disconnected);
        assert_eq!(peripheral.last_error().as_deref(), Some("link lost"));
        assert!(!environment.is_valid());
        assert!(environment.temperature().is_err());
        assert!(peripheral.discovered_services().is_empty());

        // A late discovery result for the old session is ignored
        peripheral.handle_services_discovered(&all_services());
        assert_eq!(peripheral.state(), PeripheralState::Disconnected);
    }

    #[test]
    fn test_reconnect_builds_new_services() {
        let radio = Arc::new(RecordingRadio::default());
        let peripheral = ready(&radio);
        let first = peripheral.ui_service().unwrap();

        peripheral.handle_disconnected(None);
        peripheral.set_state(PeripheralState::Connecting);
        peripheral.handle_connected();
        peripheral.handle_services_discovered(&all_services());

        let second = peripheral.ui_service().unwrap();
        assert!(!first.is_valid());
        assert!(second.is_valid());
    }

    #[test]
    fn test_connected_while_disconnecting_keeps_pending_disconnect() {
        let radio = Arc::new(RecordingRadio::default());
        let (peripheral, _) = peripheral(radio.clone());
        peripheral.set_state(PeripheralState::Connecting);
        peripheral.request_disconnect().unwrap();

        peripheral.handle_connected();

        assert_eq!(peripheral.state(), PeripheralState::Disconnecting);
        assert_eq!(
            radio.count(|call| matches!(call, RadioCall::DiscoverServices(_))),
            0
        );
        assert_eq!(
            radio.count(|call| *call == RadioCall::CancelConnection(peripheral.id())),
            2
        );

        peripheral.handle_disconnected(None);
        assert_eq!(peripheral.state(), PeripheralState::Disconnected);
    }

    #[test]
    fn test_duplicate_connected_is_ignored() {
        let radio = Arc::new(RecordingRadio::default());
        let peripheral = ready(&radio);
        let ui = peripheral.ui_service().unwrap();

        peripheral.handle_connected();

        assert_eq!(peripheral.state(), PeripheralState::Ready);
        assert!(ui.is_valid());
        assert_eq!(
            radio.count(|call| matches!(call, RadioCall::DiscoverServices(_))),
            1
        );

        // Never connected at all
        let (idle, _) = super::testing::peripheral(radio.clone());
        idle.handle_connected();
        assert_eq!(idle.state(), PeripheralState::Disconnected);
    }

    #[test]
    fn test_new_discovery_invalidates_previous_services() {
        let radio = Arc::new(RecordingRadio::default());
        let peripheral = ready(&radio);
        let first = peripheral.configuration_service().unwrap();

        peripheral.set_state(PeripheralState::Connected);
        peripheral.handle_services_discovered(&all_services());

        let second = peripheral.configuration_service().unwrap();
        assert!(!first.is_valid());
        assert!(first.set_device_name("Stale").is_err());
        assert!(second.is_valid());
    }

    #[test]
    fn test_value_update_is_cached_and_published() {
        let radio = Arc::new(RecordingRadio::default());
        let peripheral = ready(&radio);
        let mut updates = peripheral.subscribe_updates();

        peripheral.handle_value_updated(
            CharacteristicHandle::new(BATTERY_SERVICE_UUID, BATTERY_LEVEL_UUID),
            vec![77],
        );

        assert_eq!(peripheral.battery_service().unwrap().level().unwrap(), Some(77));
        let update = updates.try_recv().unwrap();
        assert_eq!(update.service, ServiceKind::Battery);
        assert_eq!(update.value, vec![77]);
        assert!(peripheral.last_seen().is_some());

        // Unknown characteristics are dropped
        peripheral.handle_value_updated(
            CharacteristicHandle::new(BATTERY_SERVICE_UUID, uuid::Uuid::new_v4()),
            vec![1],
        );
        assert!(updates.try_recv().is_err());
    }

    #[test]
    fn test_failed_write_triggers_resync() {
        let radio = Arc::new(RecordingRadio::default());
        let peripheral = ready(&radio);
        let handle = CharacteristicHandle::new(CONFIGURATION_SERVICE_UUID, DEVICE_NAME_UUID);

        peripheral.handle_write_completed(handle, None);
        assert_eq!(radio.count(|call| matches!(call, RadioCall::Read(_))), 0);

        peripheral.handle_write_completed(handle, Some("write not permitted".to_string()));
        assert_eq!(radio.count(|call| *call == RadioCall::Read(handle)), 1);
    }

    #[test]
    fn test_notification_acknowledgement() {
        let radio = Arc::new(RecordingRadio::default());
        let peripheral = ready(&radio);
        let handle = CharacteristicHandle::new(ENVIRONMENT_SERVICE_UUID, TEMPERATURE_UUID);
        let environment = peripheral.environment_service().unwrap();

        peripheral.handle_notification_state(handle, true, Some("busy".to_string()));
        assert!(!environment.notifications_enabled::<crate::protocol::Temperature>());

        peripheral.handle_notification_state(handle, true, None);
        assert!(environment.notifications_enabled::<crate::protocol::Temperature>());
    }

    #[test]
    fn test_failed_to_connect() {
        let radio = Arc::new(RecordingRadio::default());
        let (peripheral, _) = peripheral(radio);

        peripheral.set_state(PeripheralState::Connecting);
        peripheral.handle_failed_to_connect("timeout".to_string());

        assert_eq!(peripheral.state(), PeripheralState::FailedToConnect);
        assert_eq!(peripheral.last_error().as_deref(), Some("timeout"));
    }

    #[test]
    fn test_service_discovery_failure_disconnects() {
        let radio = Arc::new(RecordingRadio::default());
        let (peripheral, _) = peripheral(radio.clone());

        peripheral.set_state(PeripheralState::Connecting);
        peripheral.handle_connected();
        peripheral.handle_service_discovery_failed("gatt error".to_string());

        assert_eq!(peripheral.state(), PeripheralState::Disconnecting);
        assert_eq!(
            radio.count(|call| *call == RadioCall::CancelConnection(peripheral.id())),
            1
        );
    }

    #[test]
    fn test_advertisement_updates_identity() {
        let radio = Arc::new(RecordingRadio::default());
        let (peripheral, _) = peripheral(radio);

        let advertisement = Advertisement {
            local_name: Some("Kitchen".to_string()),
            manufacturer_data: Some(vec![0x59, 0x00, 0xab, 0x01]),
            service_uuids: vec![CONFIGURATION_SERVICE_UUID],
        };
        peripheral.update_from_advertisement(&advertisement, Some(-60));

        assert_eq!(peripheral.name().as_deref(), Some("Kitchen"));
        assert_eq!(peripheral.pairing_code().as_deref(), Some("ab01"));
        assert_eq!(peripheral.rssi(), Some(-60));
        assert!(peripheral.last_seen().is_some());
    }

    #[tokio::test]
    async fn test_state_callback() {
        let radio = Arc::new(RecordingRadio::default());
        let (peripheral, _) = peripheral(radio);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let handle = peripheral.on_state_changed(move |state| {
            let _ = tx.send(state);
        });

        peripheral.set_state(PeripheralState::Connecting);
        assert_eq!(rx.recv().await, Some(PeripheralState::Connecting));

        handle.unregister();
        tokio::task::yield_now().await;
        assert_eq!(rx.recv().await, None);
    }
}
