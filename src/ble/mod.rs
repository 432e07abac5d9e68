//! BLE communication module.
//!
//! This module provides the radio abstraction the core is written against,
//! the Thingy GATT profile, and a btleplug-backed radio for real hardware.

pub mod advertising;
pub mod btleplug_radio;
pub mod connection;
pub mod radio;
pub mod resolver;
pub mod uuids;

pub use btleplug_radio::BtleplugRadio;
pub use connection::PeripheralState;
pub use radio::{
    Advertisement, CharacteristicHandle, DiscoveredService, KnownPeripheral, PeripheralId, Radio,
    RadioEvent, RadioState,
};
pub use resolver::CharacteristicResolver;
pub use uuids::*;
