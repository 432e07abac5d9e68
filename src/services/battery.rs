//! Battery service.

use std::ops::Deref;

use crate::error::Result;
use crate::peripheral::CallbackHandle;
use crate::protocol::BatteryLevel;
use crate::services::GattService;

/// Typed access to the standard battery service.
#[derive(Debug, Clone)]
pub struct BatteryService(GattService);

impl BatteryService {
    pub(crate) fn new(service: GattService) -> Self {
        Self(service)
    }

    /// Last reported battery level in percent.
    pub fn level(&self) -> Result<Option<u8>> {
        self.value::<BatteryLevel>()
    }

    /// Register a callback for battery level notifications.
    pub fn on_level_changed<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        self.on_update::<BatteryLevel, _>(callback)
    }
}

impl Deref for BatteryService {
    type Target = GattService;

    fn deref(&self) -> &GattService {
        &self.0
    }
}
