//! Advertising data parsing.
//!
//! Thingy devices carry a pairing code in their manufacturer specific data.
//! It lets the user tell devices apart before connecting to any of them.

use crate::ble::radio::Advertisement;
use crate::ble::uuids::{CONFIGURATION_SERVICE_UUID, DFU_SERVICE_UUID};
use crate::utils::hex_string;

/// Number of leading manufacturer data bytes (the company identifier) that
/// are not part of the pairing code.
pub const PAIRING_CODE_OFFSET: usize = 2;

/// Derive the pairing code from raw manufacturer data.
///
/// Returns `None` when there is nothing after the company identifier.
pub fn pairing_code(manufacturer_data: &[u8]) -> Option<String> {
    manufacturer_data
        .get(PAIRING_CODE_OFFSET..)
        .filter(|code| !code.is_empty())
        .map(hex_string)
}

impl Advertisement {
    /// Pairing code carried by this advertisement, if any.
    pub fn pairing_code(&self) -> Option<String> {
        self.manufacturer_data.as_deref().and_then(pairing_code)
    }

    /// Check if the advertiser is in firmware update (bootloader) mode.
    pub fn is_dfu_mode(&self) -> bool {
        self.service_uuids.contains(&DFU_SERVICE_UUID)
    }

    /// Check if the advertiser exposes the configuration service signature.
    pub fn is_thingy(&self) -> bool {
        self.service_uuids.contains(&CONFIGURATION_SERVICE_UUID)
    }
}
