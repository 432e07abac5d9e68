//! Error types for the thingy-ble crate.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// The radio does not know a peripheral with this identifier.
    #[error("Peripheral not found: {identifier}")]
    PeripheralNotFound {
        /// The identifier that was searched for.
        identifier: String,
    },

    /// Services are not usable until discovery has completed.
    #[error("Peripheral not ready")]
    NotReady,

    /// The service exists on the device profile but was not discovered.
    #[error("Service not found: {name}")]
    ServiceNotFound {
        /// Human-readable service name.
        name: &'static str,
    },

    /// The service belonged to a connection session that has ended.
    #[error("Service {name} invalidated by disconnect")]
    ServiceInvalidated {
        /// Human-readable service name.
        name: &'static str,
    },

    /// The firmware did not expose an expected characteristic.
    #[error("Characteristic not discovered: {name}")]
    CharacteristicNotDiscovered {
        /// Human-readable characteristic name.
        name: &'static str,
    },

    /// A numeric field lies outside its documented range.
    #[error("{field} out of range: {value} (valid {min}..={max})")]
    OutOfRange {
        /// The field being validated.
        field: &'static str,
        /// The rejected value.
        value: u32,
        /// Inclusive lower bound.
        min: u32,
        /// Inclusive upper bound.
        max: u32,
    },

    /// A text field exceeds its maximum length.
    #[error("{field} too long: {length} bytes (max {max})")]
    TooLong {
        /// The field being validated.
        field: &'static str,
        /// Encoded length in bytes.
        length: usize,
        /// Maximum permitted length.
        max: usize,
    },

    /// A URL cannot be expressed as an Eddystone URL frame.
    #[error("Invalid URL: {reason}")]
    InvalidUrl {
        /// Why the URL was rejected.
        reason: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {name} = {value}")]
    InvalidParameter {
        /// The name of the parameter.
        name: String,
        /// The invalid value that was provided.
        value: String,
    },

    /// The requested operation is not supported.
    #[error("Operation not supported: {operation}")]
    NotSupported {
        /// Description of the unsupported operation.
        operation: String,
    },

    /// Reading or writing the identifier store failed.
    #[error("Identifier store error: {0}")]
    Store(#[from] std::io::Error),

    /// The identifier store contents could not be (de)serialized.
    #[cfg(feature = "json-store")]
    #[error("Identifier store format error: {0}")]
    StoreFormat(#[from] serde_json::Error),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error was raised by input validation, before any radio I/O.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::OutOfRange { .. }
                | Self::TooLong { .. }
                | Self::InvalidUrl { .. }
                | Self::InvalidParameter { .. }
        )
    }
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        let err = Error::OutOfRange {
            field: "advertising interval",
            value: 8001,
            min: 12,
            max: 8000,
        };
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "advertising interval out of range: 8001 (valid 12..=8000)"
        );

        assert!(!Error::CharacteristicNotDiscovered { name: "Device name" }.is_validation());
    }

    #[test]
    fn test_too_long_message() {
        let err = Error::TooLong {
            field: "device name",
            length: 12,
            max: 10,
        };
        assert_eq!(err.to_string(), "device name too long: 12 bytes (max 10)");
    }
}
