//! User interface service codecs.

use crate::ble::uuids::{ServiceKind, BUTTON_UUID, LED_UUID};
use crate::data::{ButtonState, LedState};
use crate::protocol::characteristic;

characteristic! {
    /// RGB LED mode.
    Led: LedState,
    service = ServiceKind::UserInterface,
    uuid = LED_UUID,
    name = "LED",
    decode = LedState::from_bytes,
    encode = LedState::to_bytes,
}

characteristic! {
    /// Button state, notified on press and release.
    Button: ButtonState,
    service = ServiceKind::UserInterface,
    uuid = BUTTON_UUID,
    name = "Button",
    decode = ButtonState::from_bytes,
}
