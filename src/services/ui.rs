//! User interface service: RGB LED and button.

use std::ops::Deref;

use crate::data::{ButtonState, LedState, Rgb};
use crate::error::Result;
use crate::peripheral::CallbackHandle;
use crate::protocol::{Button, Led};
use crate::services::GattService;

#[derive(Debug, Clone)]
pub struct UiService(GattService);

impl UiService {
    pub(crate) fn new(service: GattService) -> Self {
        Self(service)
    }

    /// Current LED mode; `Off` until read.
    pub fn led(&self) -> Result<LedState> {
        self.value_or_default::<Led>()
    }

    pub fn set_led(&self, state: LedState) -> Result<()> {
        self.write::<Led>(&state)
    }

    /// Set a constant colour from a `#rrggbb` string.
    ///
    /// Unparsable strings light the LED yellow.
    pub fn set_constant_color_hex(&self, hex: &str) -> Result<()> {
        self.set_led(LedState::Constant(Rgb::from_hex(hex)))
    }

    pub fn button(&self) -> Result<Option<ButtonState>> {
        self.value::<Button>()
    }

    pub fn on_button_changed<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(ButtonState) + Send + Sync + 'static,
    {
        self.on_update::<Button, _>(callback)
    }
}

impl Deref for UiService {
    type Target = GattService;

    fn deref(&self) -> &GattService {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ble::radio::testing::RecordingRadio;
    use crate::ble::uuids::ServiceKind;
    use crate::services::testing::full_service;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_hex_color_write() {
        let radio = Arc::new(RecordingRadio::default());
        let ui = UiService::new(full_service(ServiceKind::UserInterface, radio.clone()));

        assert_eq!(ui.led().unwrap(), LedState::Off);

        ui.set_constant_color_hex("#102030").unwrap();
        ui.set_constant_color_hex("oops").unwrap();

        assert_eq!(radio.writes(), vec![vec![1, 0x10, 0x20, 0x30], vec![1, 255, 255, 0]]);
        assert_eq!(ui.led().unwrap(), LedState::Constant(Rgb::YELLOW));
    }
}
