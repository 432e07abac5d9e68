//! Device manager for discovering and managing Thingy peripherals.
//!
//! The manager owns the radio, the known peripherals, and the persisted
//! identifier store. Radio events are fed to [`DeviceManager::handle_radio_event`]
//! one at a time, normally by the task started with
//! [`DeviceManager::spawn_event_loop`], and routed to the matching peripheral.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::ble::connection::PeripheralState;
use crate::ble::radio::{
    Advertisement, KnownPeripheral, PeripheralId, Radio, RadioEvent, RadioState,
};
use crate::ble::uuids::scan_signatures;
use crate::config::ManagerConfig;
use crate::error::Result;
use crate::peripheral::{CallbackHandle, Peripheral};
use crate::store::IdentifierStore;

/// Lifecycle state of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ManagerState {
    /// The radio is off, unsupported or not authorized.
    #[default]
    Unavailable,
    /// The radio just came up; stored peripherals are being restored.
    Ready,
    /// Available and not scanning.
    Idle,
    /// Scanning for peripherals.
    Scanning,
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "Unavailable"),
            Self::Ready => write!(f, "Ready"),
            Self::Idle => write!(f, "Idle"),
            Self::Scanning => write!(f, "Scanning"),
        }
    }
}

/// Event published by the manager.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// The manager lifecycle state changed.
    ManagerStateChanged(ManagerState),
    /// A peripheral advertised while scanning.
    PeripheralDiscovered {
        peripheral: Arc<Peripheral>,
        pairing_code: Option<String>,
        rssi: Option<i16>,
    },
    /// A peripheral's connection state changed or was re-emitted.
    PeripheralStateChanged {
        peripheral: PeripheralId,
        state: PeripheralState,
    },
}

/// Central manager for discovering and managing Thingy peripherals.
pub struct DeviceManager {
    /// Radio capability.
    radio: Arc<dyn Radio>,
    /// Persisted identifier store.
    store: Box<dyn IdentifierStore>,
    /// Settings.
    config: ManagerConfig,
    /// Lifecycle state.
    state: RwLock<ManagerState>,
    /// Identifiers as last persisted.
    identifiers: RwLock<Vec<PeripheralId>>,
    /// Stored peripherals and peripherals with a connection request.
    active: RwLock<Vec<Arc<Peripheral>>>,
    /// Peripherals seen during the current scan, in discovery order.
    discovered: RwLock<Vec<Arc<Peripheral>>>,
    /// Event channel.
    events_tx: broadcast::Sender<DeviceEvent>,
    /// Callback ID counter.
    callback_counter: AtomicU64,
    /// Event loop task handle.
    background_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl DeviceManager {
    /// Create a manager on top of `radio` and `store`.
    ///
    /// The persisted identifiers are loaded right away so that adding a
    /// peripheral before the radio is available never drops stored entries.
    pub fn new(
        radio: Arc<dyn Radio>,
        store: Box<dyn IdentifierStore>,
        config: ManagerConfig,
    ) -> Self {
        let identifiers = store.load().unwrap_or_else(|e| {
            warn!("Failed to load stored peripherals: {}", e);
            Vec::new()
        });
        let (events_tx, _) = broadcast::channel(config.event_channel_capacity);

        Self {
            radio,
            store,
            config,
            state: RwLock::new(ManagerState::Unavailable),
            identifiers: RwLock::new(identifiers),
            active: RwLock::new(Vec::new()),
            discovered: RwLock::new(Vec::new()),
            events_tx,
            callback_counter: AtomicU64::new(0),
            background_handle: RwLock::new(None),
        }
    }

    /// Create a manager backed by the platform Bluetooth adapter and a JSON
    /// identifier store at `config.store_path`, with its event loop running.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    #[cfg(feature = "json-store")]
    pub async fn with_btleplug(config: ManagerConfig) -> Result<Arc<Self>> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let radio = crate::ble::BtleplugRadio::new(events_tx).await?;
        let store = crate::store::JsonFileStore::new(config.store_path.clone());

        let manager = Arc::new(Self::new(Arc::new(radio), Box::new(store), config));
        manager.spawn_event_loop(events_rx);
        Ok(manager)
    }

    /// Start a task that feeds radio events to the manager in order.
    ///
    /// The task holds only a weak reference and ends when the manager is
    /// dropped or the sender side closes.
    pub fn spawn_event_loop(self: &Arc<Self>, mut events: mpsc::UnboundedReceiver<RadioEvent>) {
        let manager: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.handle_radio_event(event);
            }
            debug!("Device manager event loop ended");
        });

        if let Some(previous) = self.background_handle.write().replace(handle) {
            previous.abort();
        }
    }

    // === State ===

    /// Get the lifecycle state.
    pub fn state(&self) -> ManagerState {
        *self.state.read()
    }

    /// Check if scanning is active.
    pub fn is_scanning(&self) -> bool {
        self.state() == ManagerState::Scanning
    }

    /// Get the settings.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    fn set_state(&self, state: ManagerState) {
        let previous = std::mem::replace(&mut *self.state.write(), state);
        if previous != state {
            info!("Device manager: {} -> {}", previous, state);
            let _ = self.events_tx.send(DeviceEvent::ManagerStateChanged(state));
        }
    }

    /// Subscribe to manager events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.events_tx.subscribe()
    }

    /// Register a callback for manager events.
    pub fn on_event<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(DeviceEvent) + Send + Sync + 'static,
    {
        let callback_id = self.callback_counter.fetch_add(1, Ordering::SeqCst);
        let mut rx = self.events_tx.subscribe();

        let handle = tokio::spawn(async move {
            while let Ok(event) = rx.recv().await {
                callback(event);
            }
        });

        CallbackHandle::new(callback_id, move || {
            handle.abort();
        })
    }

    // === Peripherals ===

    /// Stored peripherals that are currently connected.
    pub fn active_peripherals(&self) -> Vec<Arc<Peripheral>> {
        self.active
            .read()
            .iter()
            .filter(|p| p.is_stored() && p.state().is_connected())
            .cloned()
            .collect()
    }

    /// All stored peripherals, whatever their connection state.
    pub fn stored_peripherals(&self) -> Vec<Arc<Peripheral>> {
        self.active
            .read()
            .iter()
            .filter(|p| p.is_stored())
            .cloned()
            .collect()
    }

    /// Peripherals seen during the current scan, in discovery order.
    pub fn discovered_peripherals(&self) -> Vec<Arc<Peripheral>> {
        self.discovered.read().clone()
    }

    /// Look up a peripheral by identifier.
    pub fn peripheral(&self, id: PeripheralId) -> Option<Arc<Peripheral>> {
        self.active_peripheral(id).or_else(|| {
            self.discovered
                .read()
                .iter()
                .find(|p| p.id() == id)
                .cloned()
        })
    }

    fn active_peripheral(&self, id: PeripheralId) -> Option<Arc<Peripheral>> {
        self.active.read().iter().find(|p| p.id() == id).cloned()
    }

    fn track(&self, peripheral: &Arc<Peripheral>) {
        let mut active = self.active.write();
        if !active.iter().any(|p| p.id() == peripheral.id()) {
            active.push(peripheral.clone());
        }
    }

    fn new_peripheral(&self, known: KnownPeripheral) -> Arc<Peripheral> {
        Arc::new(Peripheral::new(
            known,
            self.radio.clone(),
            self.events_tx.clone(),
            self.config.update_channel_capacity,
        ))
    }

    /// Track `peripheral` for reconnection and persist its identifier.
    ///
    /// Adding an already stored peripheral changes nothing.
    pub fn add_peripheral(&self, peripheral: &Arc<Peripheral>) -> Result<()> {
        peripheral.set_stored(true);
        self.track(peripheral);

        let snapshot = {
            let mut identifiers = self.identifiers.write();
            if identifiers.contains(&peripheral.id()) {
                return Ok(());
            }
            identifiers.push(peripheral.id());
            identifiers.clone()
        };

        info!("Storing peripheral {}", peripheral.id());
        if let Err(e) = self.store.save(&snapshot) {
            // Not persisted, so a retry must save again.
            self.identifiers.write().retain(|known| *known != peripheral.id());
            return Err(e);
        }
        Ok(())
    }

    /// Stop tracking `peripheral`, disconnecting it first if needed.
    ///
    /// Returns whether its identifier was removed from the store. Unknown
    /// peripherals return `false` and leave the store untouched.
    pub fn remove_peripheral(&self, peripheral: &Arc<Peripheral>) -> bool {
        let id = peripheral.id();

        if !peripheral.state().is_terminal() {
            if let Err(e) = self.disconnect(peripheral) {
                warn!("Failed to disconnect {} before removal: {}", id, e);
            }
        }
        peripheral.set_stored(false);
        // No further radio events are routed to a removed peripheral.
        peripheral.force_disconnected();
        self.active.write().retain(|p| p.id() != id);

        let snapshot = {
            let mut identifiers = self.identifiers.write();
            let before = identifiers.len();
            identifiers.retain(|known| *known != id);
            if identifiers.len() == before {
                debug!("Peripheral {} was not stored", id);
                return false;
            }
            identifiers.clone()
        };

        info!("Removing stored peripheral {}", id);
        match self.store.save(&snapshot) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to persist removal of {}: {}", id, e);
                false
            }
        }
    }

    // === Scanning ===

    /// Scan for Thingy peripherals, optionally including devices in
    /// firmware update mode. Does nothing unless the manager is idle.
    pub fn discover_devices(&self, include_dfu_state: bool) -> Result<()> {
        let state = self.state();
        if state != ManagerState::Idle {
            debug!("Not starting scan in state {}", state);
            return Ok(());
        }

        info!("Starting scan (include DFU: {})", include_dfu_state);
        self.discovered.write().clear();
        self.radio.scan(
            &scan_signatures(include_dfu_state),
            self.config.allow_duplicates,
        )?;
        self.set_state(ManagerState::Scanning);
        Ok(())
    }

    /// Stop scanning. Does nothing unless a scan is running.
    pub fn stop_scan(&self) -> Result<()> {
        if self.state() != ManagerState::Scanning {
            return Ok(());
        }

        info!("Stopping scan");
        self.radio.stop_scan()?;
        self.set_state(ManagerState::Idle);
        Ok(())
    }

    // === Connections ===

    /// Connect to `peripheral`.
    ///
    /// An already connected peripheral re-emits its state instead of issuing
    /// a second radio request.
    pub fn connect(&self, peripheral: &Arc<Peripheral>) -> Result<()> {
        self.track(peripheral);

        match peripheral.state() {
            PeripheralState::Connected | PeripheralState::Ready => {
                peripheral.reemit_state();
                Ok(())
            }
            PeripheralState::Connecting => {
                debug!("Already connecting to {}", peripheral.id());
                Ok(())
            }
            _ => {
                peripheral.set_state(PeripheralState::Connecting);
                if let Err(e) = self.radio.connect(peripheral.id()) {
                    peripheral.handle_failed_to_connect(e.to_string());
                    return Err(e);
                }
                Ok(())
            }
        }
    }

    /// Disconnect from `peripheral`.
    ///
    /// A pending disconnect is left alone; a disconnected peripheral
    /// re-emits its state.
    pub fn disconnect(&self, peripheral: &Arc<Peripheral>) -> Result<()> {
        match peripheral.state() {
            PeripheralState::Disconnecting => {
                debug!("Already disconnecting from {}", peripheral.id());
                Ok(())
            }
            PeripheralState::Disconnected => {
                peripheral.reemit_state();
                Ok(())
            }
            _ => peripheral.request_disconnect(),
        }
    }

    /// Stop scanning and disconnect every connected peripheral.
    pub fn shutdown(&self) -> Result<()> {
        info!("Shutting down device manager");

        self.stop_scan()?;

        let peripherals: Vec<_> = self.active.read().clone();
        for peripheral in peripherals {
            if peripheral.state().is_terminal() {
                continue;
            }
            if let Err(e) = self.disconnect(&peripheral) {
                warn!("Error disconnecting {}: {}", peripheral.id(), e);
            }
        }

        Ok(())
    }

    // === Radio events ===

    /// Apply one radio event.
    pub fn handle_radio_event(&self, event: RadioEvent) {
        match event {
            RadioEvent::StateChanged(state) => self.handle_radio_state(state),
            RadioEvent::PeripheralDiscovered {
                peripheral,
                advertisement,
                rssi,
            } => self.handle_discovered(peripheral, &advertisement, rssi),
            event => {
                let Some(id) = event.peripheral_id() else {
                    return;
                };
                let Some(peripheral) = self.active_peripheral(id) else {
                    debug!("Ignoring radio event for unknown peripheral {}", id);
                    return;
                };
                Self::route(&peripheral, event);
            }
        }
    }

    fn route(peripheral: &Peripheral, event: RadioEvent) {
        match event {
            RadioEvent::Connected(_) => peripheral.handle_connected(),
            RadioEvent::FailedToConnect { error, .. } => peripheral.handle_failed_to_connect(error),
            RadioEvent::Disconnected { error, .. } => peripheral.handle_disconnected(error),
            RadioEvent::ServicesDiscovered { services, .. } => {
                peripheral.handle_services_discovered(&services)
            }
            RadioEvent::ServiceDiscoveryFailed { error, .. } => {
                peripheral.handle_service_discovery_failed(error)
            }
            RadioEvent::CharacteristicValueUpdated {
                characteristic,
                value,
                ..
            } => peripheral.handle_value_updated(characteristic, value),
            RadioEvent::WriteCompleted {
                characteristic,
                error,
                ..
            } => peripheral.handle_write_completed(characteristic, error),
            RadioEvent::NotificationStateChanged {
                characteristic,
                enabled,
                error,
                ..
            } => peripheral.handle_notification_state(characteristic, enabled, error),
            RadioEvent::StateChanged(_) | RadioEvent::PeripheralDiscovered { .. } => {}
        }
    }

    fn handle_radio_state(&self, state: RadioState) {
        debug!("Radio state: {:?}", state);

        if !state.is_available() {
            self.set_state(ManagerState::Unavailable);
            let peripherals: Vec<_> = self.active.read().clone();
            for peripheral in peripherals {
                if !peripheral.state().is_terminal() {
                    peripheral.handle_disconnected(Some(format!("radio {:?}", state)));
                }
            }
            return;
        }

        if self.state() != ManagerState::Unavailable {
            return;
        }

        self.set_state(ManagerState::Ready);
        self.restore_stored_peripherals();
        self.set_state(ManagerState::Idle);
    }

    /// Instantiate a peripheral for every persisted identifier the radio
    /// still knows.
    fn restore_stored_peripherals(&self) {
        let identifiers = self.identifiers.read().clone();
        if identifiers.is_empty() {
            return;
        }

        let known = self.radio.retrieve_known(&identifiers);
        for entry in known {
            if self.active_peripheral(entry.id).is_some() {
                continue;
            }
            let peripheral = self.new_peripheral(entry);
            peripheral.set_stored(true);
            self.active.write().push(peripheral);
        }

        let restored = self.stored_peripherals().len();
        if restored < identifiers.len() {
            debug!(
                "Radio knows {} of {} stored peripherals",
                restored,
                identifiers.len()
            );
        }
        info!("Restored {} stored peripherals", restored);
    }

    fn handle_discovered(
        &self,
        known: KnownPeripheral,
        advertisement: &Advertisement,
        rssi: Option<i16>,
    ) {
        let existing = self
            .active_peripheral(known.id)
            .or_else(|| {
                self.discovered
                    .read()
                    .iter()
                    .find(|p| p.id() == known.id)
                    .cloned()
            });

        let peripheral = match existing {
            Some(peripheral) => peripheral,
            None => {
                info!(
                    "Discovered new peripheral {} ({})",
                    known.id,
                    known.name.as_deref().unwrap_or("unnamed")
                );
                self.new_peripheral(known)
            }
        };
        peripheral.update_from_advertisement(advertisement, rssi);

        {
            let mut discovered = self.discovered.write();
            if !discovered.iter().any(|p| p.id() == peripheral.id()) {
                discovered.push(peripheral.clone());
            }
        }

        let _ = self.events_tx.send(DeviceEvent::PeripheralDiscovered {
            peripheral,
            pairing_code: advertisement.pairing_code(),
            rssi,
        });
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        if let Some(handle) = self.background_handle.write().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::radio::testing::{RadioCall, RecordingRadio};
    use crate::ble::radio::{CharacteristicHandle, MockRadio};
    use crate::ble::uuids::*;
    use crate::error::Error;
    use crate::peripheral::testing::all_services;
    use crate::store::{MemoryStore, MockIdentifierStore};
    use pretty_assertions::assert_eq;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    struct Fixture {
        radio: Arc<RecordingRadio>,
        store: Arc<MemoryStore>,
        manager: DeviceManager,
    }

    fn fixture_with(stored: Vec<KnownPeripheral>) -> Fixture {
        let ids = stored.iter().map(|known| known.id).collect();
        let radio = Arc::new(RecordingRadio::with_known(stored));
        let store = Arc::new(MemoryStore::with_identifiers(ids));
        let manager = DeviceManager::new(
            radio.clone(),
            Box::new(store.clone()),
            ManagerConfig::default(),
        );
        manager.handle_radio_event(RadioEvent::StateChanged(RadioState::PoweredOn));
        Fixture {
            radio,
            store,
            manager,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Vec::new())
    }

    fn advertise(manager: &DeviceManager, id: Uuid) {
        manager.handle_radio_event(RadioEvent::PeripheralDiscovered {
            peripheral: KnownPeripheral::new(id, Some("Thingy".to_string())),
            advertisement: Advertisement {
                local_name: Some("Thingy".to_string()),
                manufacturer_data: Some(vec![0x59, 0x00, 0x12, 0x34]),
                service_uuids: vec![CONFIGURATION_SERVICE_UUID],
            },
            rssi: Some(-55),
        });
    }

    fn discovered(manager: &DeviceManager) -> Arc<Peripheral> {
        let id = Uuid::new_v4();
        advertise(manager, id);
        manager.peripheral(id).unwrap()
    }

    fn connect_ready(manager: &DeviceManager, peripheral: &Arc<Peripheral>) {
        manager.connect(peripheral).unwrap();
        manager.handle_radio_event(RadioEvent::Connected(peripheral.id()));
        manager.handle_radio_event(RadioEvent::ServicesDiscovered {
            peripheral: peripheral.id(),
            services: all_services(),
        });
    }

    #[test]
    fn test_lifecycle_restores_stored_peripherals() {
        let kept = KnownPeripheral::new(Uuid::new_v4(), Some("Desk".to_string()));
        let Fixture { manager, .. } = fixture_with(vec![kept.clone()]);

        assert_eq!(manager.state(), ManagerState::Idle);
        let stored = manager.stored_peripherals();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id(), kept.id);
        assert_eq!(stored[0].name().as_deref(), Some("Desk"));
        assert!(manager.active_peripherals().is_empty());
    }

    #[test]
    fn test_lifecycle_events() {
        let radio = Arc::new(RecordingRadio::default());
        let manager = DeviceManager::new(
            radio,
            Box::new(MemoryStore::default()),
            ManagerConfig::default(),
        );
        let mut events = manager.subscribe();

        manager.handle_radio_event(RadioEvent::StateChanged(RadioState::PoweredOn));
        manager.handle_radio_event(RadioEvent::StateChanged(RadioState::PoweredOn));
        manager.handle_radio_event(RadioEvent::StateChanged(RadioState::PoweredOff));

        let states: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
            .filter_map(|event| match event {
                DeviceEvent::ManagerStateChanged(state) => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                ManagerState::Ready,
                ManagerState::Idle,
                ManagerState::Unavailable
            ]
        );
    }

    #[test]
    fn test_unavailable_radio_ends_connections() {
        let Fixture { manager, .. } = fixture();
        let peripheral = discovered(&manager);
        connect_ready(&manager, &peripheral);
        let ui = peripheral.ui_service().unwrap();

        manager.handle_radio_event(RadioEvent::StateChanged(RadioState::Resetting));

        assert_eq!(manager.state(), ManagerState::Unavailable);
        assert_eq!(peripheral.state(), PeripheralState::Disconnected);
        assert!(!ui.is_valid());

        manager.discover_devices(false).unwrap();
        assert!(!manager.is_scanning());
    }

    #[test]
    fn test_discover_while_scanning_is_noop() {
        let mut radio = MockRadio::new();
        radio.expect_retrieve_known().returning(|_| Vec::new());
        radio
            .expect_scan()
            .withf(|services, allow_duplicates| {
                services.to_vec() == vec![CONFIGURATION_SERVICE_UUID] && !*allow_duplicates
            })
            .times(1)
            .returning(|_, _| Ok(()));
        radio.expect_stop_scan().times(1).returning(|| Ok(()));

        let manager = DeviceManager::new(
            Arc::new(radio),
            Box::new(MemoryStore::default()),
            ManagerConfig::default(),
        );
        manager.handle_radio_event(RadioEvent::StateChanged(RadioState::PoweredOn));

        assert_ok!(manager.discover_devices(false));
        assert_ok!(manager.discover_devices(false));
        assert!(manager.is_scanning());

        assert_ok!(manager.stop_scan());
        assert_ok!(manager.stop_scan());
        assert_eq!(manager.state(), ManagerState::Idle);
    }

    #[test]
    fn test_stop_scan_while_idle_is_noop() {
        let Fixture { radio, manager, .. } = fixture();
        manager.stop_scan().unwrap();
        assert!(radio.calls().is_empty());
    }

    #[test]
    fn test_discover_before_radio_available_is_noop() {
        let radio = Arc::new(RecordingRadio::default());
        let manager = DeviceManager::new(
            radio.clone(),
            Box::new(MemoryStore::default()),
            ManagerConfig::default(),
        );
        manager.discover_devices(true).unwrap();
        assert!(radio.calls().is_empty());
    }

    #[test]
    fn test_dfu_signature_included_on_request() {
        let Fixture { radio, manager, .. } = fixture();
        manager.discover_devices(true).unwrap();
        assert_eq!(
            radio.calls(),
            vec![RadioCall::Scan {
                services: vec![CONFIGURATION_SERVICE_UUID, DFU_SERVICE_UUID],
                allow_duplicates: false
            }]
        );
    }

    #[test]
    fn test_duplicate_advertisement_yields_one_entry() {
        let Fixture { manager, .. } = fixture();
        manager.discover_devices(false).unwrap();
        let mut events = manager.subscribe();

        let id = Uuid::new_v4();
        advertise(&manager, id);
        advertise(&manager, id);

        assert_eq!(manager.discovered_peripherals().len(), 1);
        let peripheral = &manager.discovered_peripherals()[0];
        assert_eq!(peripheral.pairing_code().as_deref(), Some("1234"));
        assert_eq!(peripheral.rssi(), Some(-55));

        match events.try_recv().unwrap() {
            DeviceEvent::PeripheralDiscovered {
                peripheral,
                pairing_code,
                rssi,
            } => {
                assert_eq!(peripheral.id(), id);
                assert_eq!(pairing_code.as_deref(), Some("1234"));
                assert_eq!(rssi, Some(-55));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_add_peripheral_is_idempotent() {
        let Fixture { store, manager, .. } = fixture();
        let peripheral = discovered(&manager);

        assert_ok!(manager.add_peripheral(&peripheral));
        assert_ok!(manager.add_peripheral(&peripheral));

        assert!(peripheral.is_stored());
        assert_eq!(store.identifiers(), vec![peripheral.id()]);
        assert_eq!(store.save_count(), 1);
        assert_eq!(manager.stored_peripherals().len(), 1);
    }

    #[test]
    fn test_active_peripherals_are_stored_and_connected() {
        let Fixture { manager, .. } = fixture();
        let stored = discovered(&manager);
        let transient = discovered(&manager);
        manager.add_peripheral(&stored).unwrap();

        connect_ready(&manager, &stored);
        connect_ready(&manager, &transient);

        let active = manager.active_peripherals();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id(), stored.id());
    }

    #[test]
    fn test_remove_disconnecting_peripheral_forces_disconnected() {
        let Fixture {
            radio,
            store,
            manager,
        } = fixture();
        let peripheral = discovered(&manager);
        manager.add_peripheral(&peripheral).unwrap();
        connect_ready(&manager, &peripheral);
        manager.disconnect(&peripheral).unwrap();
        assert_eq!(peripheral.state(), PeripheralState::Disconnecting);

        assert!(manager.remove_peripheral(&peripheral));

        assert_eq!(peripheral.state(), PeripheralState::Disconnected);
        assert!(!peripheral.is_stored());
        assert!(store.identifiers().is_empty());
        assert!(manager.stored_peripherals().is_empty());
        // The pending disconnect was not requested twice
        assert_eq!(
            radio.count(|call| matches!(call, RadioCall::CancelConnection(_))),
            1
        );

        // Late callbacks for the removed peripheral are ignored
        manager.handle_radio_event(RadioEvent::Disconnected {
            peripheral: peripheral.id(),
            error: None,
        });
        assert_eq!(peripheral.state(), PeripheralState::Disconnected);
    }

    #[test]
    fn test_remove_connected_peripheral_disconnects_first() {
        let Fixture { radio, manager, .. } = fixture();
        let peripheral = discovered(&manager);
        manager.add_peripheral(&peripheral).unwrap();
        connect_ready(&manager, &peripheral);

        assert!(manager.remove_peripheral(&peripheral));
        assert_eq!(
            radio.count(|call| *call == RadioCall::CancelConnection(peripheral.id())),
            1
        );
        assert_eq!(peripheral.state(), PeripheralState::Disconnected);
    }

    #[test]
    fn test_remove_unknown_peripheral_leaves_store_untouched() {
        let Fixture { store, manager, .. } = fixture();
        let peripheral = discovered(&manager);

        assert!(!manager.remove_peripheral(&peripheral));
        assert_eq!(store.save_count(), 0);
    }

    #[test]
    fn test_remove_reports_store_failure() {
        let mut store = MockIdentifierStore::new();
        store.expect_load().returning(|| Ok(Vec::new()));
        let mut saves = 0;
        store.expect_save().times(2).returning(move |_| {
            saves += 1;
            if saves == 1 {
                Ok(())
            } else {
                Err(Error::Store(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )))
            }
        });

        let manager = DeviceManager::new(
            Arc::new(RecordingRadio::default()),
            Box::new(store),
            ManagerConfig::default(),
        );
        manager.handle_radio_event(RadioEvent::StateChanged(RadioState::PoweredOn));
        let peripheral = discovered(&manager);

        manager.add_peripheral(&peripheral).unwrap();
        assert!(!manager.remove_peripheral(&peripheral));
    }

    #[test]
    fn test_add_peripheral_retries_after_store_failure() {
        let mut store = MockIdentifierStore::new();
        store.expect_load().returning(|| Ok(Vec::new()));
        let mut saves = 0;
        store.expect_save().times(2).returning(move |identifiers| {
            saves += 1;
            assert_eq!(identifiers.len(), 1);
            if saves == 1 {
                Err(Error::Store(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )))
            } else {
                Ok(())
            }
        });

        let manager = DeviceManager::new(
            Arc::new(RecordingRadio::default()),
            Box::new(store),
            ManagerConfig::default(),
        );
        manager.handle_radio_event(RadioEvent::StateChanged(RadioState::PoweredOn));
        let peripheral = discovered(&manager);

        assert_err!(manager.add_peripheral(&peripheral));
        assert_ok!(manager.add_peripheral(&peripheral));
        assert!(peripheral.is_stored());
    }

    #[test]
    fn test_connect_issues_radio_request_once() {
        let Fixture { radio, manager, .. } = fixture();
        let peripheral = discovered(&manager);

        manager.connect(&peripheral).unwrap();
        manager.connect(&peripheral).unwrap();

        assert_eq!(peripheral.state(), PeripheralState::Connecting);
        assert_eq!(
            radio.count(|call| *call == RadioCall::Connect(peripheral.id())),
            1
        );
    }

    #[test]
    fn test_connect_when_ready_reemits_without_radio_call() {
        let Fixture { radio, manager, .. } = fixture();
        let peripheral = discovered(&manager);
        connect_ready(&manager, &peripheral);
        let mut states = peripheral.subscribe_state();

        manager.connect(&peripheral).unwrap();

        assert_eq!(states.try_recv().unwrap(), PeripheralState::Ready);
        assert_eq!(
            radio.count(|call| matches!(call, RadioCall::Connect(_))),
            1
        );
    }

    #[test]
    fn test_connect_failure() {
        let Fixture { manager, .. } = fixture();
        let peripheral = discovered(&manager);

        manager.connect(&peripheral).unwrap();
        manager.handle_radio_event(RadioEvent::FailedToConnect {
            peripheral: peripheral.id(),
            error: "out of range".to_string(),
        });

        assert_eq!(peripheral.state(), PeripheralState::FailedToConnect);
        assert!(peripheral.configuration_service().is_err());
    }

    #[test]
    fn test_disconnect_transitions() {
        let Fixture { radio, manager, .. } = fixture();
        let peripheral = discovered(&manager);
        let mut states = peripheral.subscribe_state();

        // Disconnected re-emits
        manager.disconnect(&peripheral).unwrap();
        assert_eq!(states.try_recv().unwrap(), PeripheralState::Disconnected);
        assert!(radio.calls().is_empty());

        connect_ready(&manager, &peripheral);
        manager.disconnect(&peripheral).unwrap();
        manager.disconnect(&peripheral).unwrap();
        assert_eq!(
            radio.count(|call| matches!(call, RadioCall::CancelConnection(_))),
            1
        );

        manager.handle_radio_event(RadioEvent::Disconnected {
            peripheral: peripheral.id(),
            error: None,
        });
        assert_eq!(peripheral.state(), PeripheralState::Disconnected);
    }

    #[test]
    fn test_event_for_unknown_peripheral_is_ignored() {
        let Fixture { manager, .. } = fixture();
        let peripheral = discovered(&manager);
        connect_ready(&manager, &peripheral);
        let mut events = manager.subscribe();

        manager.handle_radio_event(RadioEvent::Disconnected {
            peripheral: Uuid::new_v4(),
            error: Some("gone".to_string()),
        });

        assert_eq!(peripheral.state(), PeripheralState::Ready);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_rejected_write_end_to_end() {
        let Fixture { radio, manager, .. } = fixture();
        let peripheral = discovered(&manager);
        connect_ready(&manager, &peripheral);

        manager.handle_radio_event(RadioEvent::CharacteristicValueUpdated {
            peripheral: peripheral.id(),
            characteristic: CharacteristicHandle::new(
                CONFIGURATION_SERVICE_UUID,
                ADVERTISING_PARAMETERS_UUID,
            ),
            value: vec![0xa8, 0x02, 0xb4],
        });

        let config = peripheral.configuration_service().unwrap();
        let before = config.advertising_parameters().unwrap();
        assert_eq!(before.interval, 680);

        let error = assert_err!(config.set_advertising_parameters(8001, 180));
        assert!(matches!(error, Error::OutOfRange { .. }));
        assert!(radio.writes().is_empty());
        assert_eq!(config.advertising_parameters().unwrap(), before);
    }

    #[test]
    fn test_shutdown_disconnects_and_stops_scan() {
        let Fixture { radio, manager, .. } = fixture();
        let peripheral = discovered(&manager);
        connect_ready(&manager, &peripheral);
        manager.discover_devices(false).unwrap();

        manager.shutdown().unwrap();

        assert_eq!(manager.state(), ManagerState::Idle);
        assert_eq!(peripheral.state(), PeripheralState::Disconnecting);
        assert_eq!(radio.count(|call| *call == RadioCall::StopScan), 1);
    }

    #[tokio::test]
    async fn test_event_loop_applies_radio_events_in_order() {
        let radio = Arc::new(RecordingRadio::default());
        let manager = Arc::new(DeviceManager::new(
            radio,
            Box::new(MemoryStore::default()),
            ManagerConfig::default(),
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        let mut events = manager.subscribe();
        manager.spawn_event_loop(rx);

        tx.send(RadioEvent::StateChanged(RadioState::PoweredOn))
            .unwrap();

        let mut seen = Vec::new();
        while seen.len() < 2 {
            if let DeviceEvent::ManagerStateChanged(state) = events.recv().await.unwrap() {
                seen.push(state);
            }
        }
        assert_eq!(seen, vec![ManagerState::Ready, ManagerState::Idle]);
        assert_eq!(manager.state(), ManagerState::Idle);
    }

    #[tokio::test]
    async fn test_on_event_callback() {
        let Fixture { manager, .. } = fixture();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = manager.on_event(move |event| {
            if let DeviceEvent::PeripheralDiscovered { pairing_code, .. } = event {
                let _ = tx.send(pairing_code);
            }
        });

        manager.discover_devices(false).unwrap();
        advertise(&manager, Uuid::new_v4());

        assert_eq!(rx.recv().await, Some(Some("1234".to_string())));
    }
}
