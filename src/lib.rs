// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # thingy-ble
//!
//! A cross-platform Rust library for managing Nordic Thingy multi-sensor
//! peripherals over Bluetooth Low Energy.
//!
//! The core is written against the [`Radio`](ble::Radio) trait. Requests go
//! out through it and their outcomes come back as
//! [`RadioEvent`](ble::RadioEvent)s, which the [`DeviceManager`] applies one
//! at a time. [`BtleplugRadio`](ble::BtleplugRadio) drives real hardware.
//!
//! ## Features
//!
//! - **Discovery**: Scan for Thingy devices, optionally including devices in
//!   firmware update mode, and read their pairing codes
//! - **Stored Peripherals**: Remember peripherals across restarts and restore
//!   them when the radio comes up
//! - **Typed Services**: Configuration, Environment, User Interface, Motion
//!   and Battery services with validated writes and cached reads
//! - **Notifications**: Subscribe to characteristic updates per peripheral
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use thingy_ble::{DeviceEvent, DeviceManager, ManagerConfig, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = DeviceManager::with_btleplug(ManagerConfig::default()).await?;
//!     let mut events = manager.subscribe();
//!
//!     while let Ok(event) = events.recv().await {
//!         match event {
//!             DeviceEvent::ManagerStateChanged(state) if state == thingy_ble::ManagerState::Idle => {
//!                 manager.discover_devices(false)?;
//!             }
//!             DeviceEvent::PeripheralDiscovered { peripheral, pairing_code, .. } => {
//!                 println!("Found {} ({:?})", peripheral.id(), pairing_code);
//!                 manager.stop_scan()?;
//!                 manager.connect(&peripheral)?;
//!             }
//!             _ => {}
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for data types
//! - `json-store` (default): Persist stored peripheral identifiers to a JSON file

// Public modules
pub mod ble;
pub mod config;
pub mod data;
pub mod device_manager;
pub mod error;
pub mod peripheral;
pub mod protocol;
pub mod services;
pub mod store;
pub mod utils;

// Re-exports for convenience
pub use config::ManagerConfig;
pub use device_manager::{DeviceEvent, DeviceManager, ManagerState};
pub use error::{Error, Result};
pub use peripheral::{CallbackHandle, Peripheral};
pub use utils::celsius_to_fahrenheit;

// Re-export commonly used types from submodules
pub use ble::connection::PeripheralState;
pub use ble::uuids::ServiceKind;
pub use services::{
    BatteryService, CharacteristicUpdate, ConfigurationService, EnvironmentService, GattService,
    MotionService, UiService,
};
#[cfg(feature = "json-store")]
pub use store::JsonFileStore;
pub use store::{IdentifierStore, MemoryStore};
