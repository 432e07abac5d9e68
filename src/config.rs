//! Device manager configuration.

use std::path::PathBuf;

/// Settings for a [`DeviceManager`](crate::DeviceManager).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ManagerConfig {
    /// Report every advertisement instead of the first per device.
    pub allow_duplicates: bool,
    /// Capacity of the manager event channel.
    pub event_channel_capacity: usize,
    /// Capacity of each peripheral's characteristic update channel.
    pub update_channel_capacity: usize,
    /// Where the JSON identifier store lives.
    pub store_path: PathBuf,
}

impl ManagerConfig {
    /// Default event channel capacity.
    pub const DEFAULT_EVENT_CAPACITY: usize = 64;
    /// Default update channel capacity.
    pub const DEFAULT_UPDATE_CAPACITY: usize = 256;
    /// Default identifier store file name.
    pub const DEFAULT_STORE_FILE: &'static str = "thingy-peripherals.json";

    /// Use a different identifier store location.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            allow_duplicates: false,
            event_channel_capacity: Self::DEFAULT_EVENT_CAPACITY,
            update_channel_capacity: Self::DEFAULT_UPDATE_CAPACITY,
            store_path: PathBuf::from(Self::DEFAULT_STORE_FILE),
        }
    }
}
