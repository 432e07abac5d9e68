//! Utility functions for the thingy-ble crate.

use std::fmt::Write as _;

/// Convert Celsius to Fahrenheit.
///
/// # Example
///
/// ```
/// use thingy_ble::celsius_to_fahrenheit;
///
/// let fahrenheit = celsius_to_fahrenheit(100.0);
/// assert!((fahrenheit - 212.0).abs() < 0.001);
/// ```
#[inline]
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Encode bytes as a lower-case hex string.
///
/// ```
/// use thingy_ble::utils::hex_string;
///
/// assert_eq!(hex_string(&[0x0a, 0xff]), "0aff");
/// ```
pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
            let _ = write!(out, "{:02x}", byte);
            out
        })
}
