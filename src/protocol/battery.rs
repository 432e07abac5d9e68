//! Battery service codecs.

use crate::ble::uuids::{ServiceKind, BATTERY_LEVEL_UUID};
use crate::data::ui::decode_battery_level;
use crate::protocol::characteristic;

characteristic! {
    /// Battery level in percent (0-100).
    BatteryLevel: u8,
    service = ServiceKind::Battery,
    uuid = BATTERY_LEVEL_UUID,
    name = "Battery level",
    decode = decode_battery_level,
}
