//! Configuration service data structures.
//!
//! Device name, advertising and connection parameters, cloud token,
//! firmware version and MTU request.

use bytes::{Buf, BufMut, BytesMut};

use crate::data::check_range;
use crate::error::{Error, Result};

/// Maximum device name length in UTF-16 code units.
pub const DEVICE_NAME_MAX_UTF16: usize = 10;

/// Maximum cloud token length in bytes.
pub const CLOUD_TOKEN_MAX_BYTES: usize = 250;

/// Validate and encode a device name.
///
/// The limit is counted in UTF-16 code units; the error reports the UTF-8
/// byte length of the rejected name.
pub fn encode_device_name(name: &str) -> Result<Vec<u8>> {
    if name.encode_utf16().count() > DEVICE_NAME_MAX_UTF16 {
        return Err(Error::TooLong {
            field: "device name",
            length: name.len(),
            max: DEVICE_NAME_MAX_UTF16,
        });
    }
    Ok(name.as_bytes().to_vec())
}

/// Validate and encode a cloud token.
pub fn encode_cloud_token(token: &str) -> Result<Vec<u8>> {
    if token.len() > CLOUD_TOKEN_MAX_BYTES {
        return Err(Error::TooLong {
            field: "cloud token",
            length: token.len(),
            max: CLOUD_TOKEN_MAX_BYTES,
        });
    }
    Ok(token.as_bytes().to_vec())
}

/// Decode a UTF-8 text characteristic. Invalid UTF-8 yields `None`.
pub fn decode_text(data: &[u8]) -> Option<String> {
    std::str::from_utf8(data).ok().map(str::to_owned)
}

/// Advertising interval and timeout.
///
/// Format (3 bytes):
/// - Bytes 0-1: Interval (uint16_t, 12-8000)
/// - Byte 2: Timeout in seconds (uint8_t, 0-180, 0 = never)
///
/// The default is the all-zero record reported before the first read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdvertisingParameters {
    /// Advertising interval.
    pub interval: u16,
    /// Advertising timeout in seconds.
    pub timeout: u8,
}

impl AdvertisingParameters {
    /// Size of the encoded record in bytes.
    pub const SIZE: usize = 3;
    /// Minimum advertising interval.
    pub const INTERVAL_MIN: u16 = 12;
    /// Maximum advertising interval.
    pub const INTERVAL_MAX: u16 = 8000;
    /// Maximum advertising timeout.
    pub const TIMEOUT_MAX: u8 = 180;

    /// Create validated advertising parameters.
    pub fn new(interval: u16, timeout: u8) -> Result<Self> {
        let params = Self { interval, timeout };
        params.validate()?;
        Ok(params)
    }

    /// Check every field against its range.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "advertising interval",
            self.interval.into(),
            Self::INTERVAL_MIN.into(),
            Self::INTERVAL_MAX.into(),
        )?;
        check_range(
            "advertising timeout",
            self.timeout.into(),
            0,
            Self::TIMEOUT_MAX.into(),
        )
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut buf = data;
        Some(Self {
            interval: buf.get_u16_le(),
            timeout: buf.get_u8(),
        })
    }

    /// Validate and encode to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u16_le(self.interval);
        buf.put_u8(self.timeout);
        Ok(buf.to_vec())
    }
}

/// Preferred connection parameters.
///
/// Format (8 bytes):
/// - Bytes 0-1: Minimum connection interval in 1.25 ms units (6-3200)
/// - Bytes 2-3: Maximum connection interval in 1.25 ms units (6-3200)
/// - Bytes 4-5: Slave latency in connection events (0-499)
/// - Bytes 6-7: Supervision timeout in 10 ms units (10-3200)
///
/// The supervision timeout must also exceed `(1 + latency) * max_interval * 2`
/// once both are expressed in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionParameters {
    /// Minimum connection interval (1.25 ms units).
    pub min_interval: u16,
    /// Maximum connection interval (1.25 ms units).
    pub max_interval: u16,
    /// Slave latency.
    pub slave_latency: u16,
    /// Supervision timeout (10 ms units).
    pub supervision_timeout: u16,
}

impl ConnectionParameters {
    /// Size of the encoded record in bytes.
    pub const SIZE: usize = 8;
    /// Minimum connection interval value.
    pub const INTERVAL_MIN: u16 = 6;
    /// Maximum connection interval value.
    pub const INTERVAL_MAX: u16 = 3200;
    /// Maximum slave latency.
    pub const LATENCY_MAX: u16 = 499;
    /// Minimum supervision timeout.
    pub const TIMEOUT_MIN: u16 = 10;
    /// Maximum supervision timeout.
    pub const TIMEOUT_MAX: u16 = 3200;

    /// Check every field against its range and the cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "minimum connection interval",
            self.min_interval.into(),
            Self::INTERVAL_MIN.into(),
            Self::INTERVAL_MAX.into(),
        )?;
        check_range(
            "maximum connection interval",
            self.max_interval.into(),
            Self::INTERVAL_MIN.into(),
            Self::INTERVAL_MAX.into(),
        )?;
        check_range(
            "slave latency",
            self.slave_latency.into(),
            0,
            Self::LATENCY_MAX.into(),
        )?;
        check_range(
            "supervision timeout",
            self.supervision_timeout.into(),
            Self::TIMEOUT_MIN.into(),
            Self::TIMEOUT_MAX.into(),
        )?;

        if self.min_interval > self.max_interval {
            return Err(Error::InvalidParameter {
                name: "min_interval".to_string(),
                value: format!("{} > max_interval {}", self.min_interval, self.max_interval),
            });
        }

        // timeout * 10ms > (1 + latency) * max_interval * 1.25ms * 2
        let timeout = u32::from(self.supervision_timeout) * 4;
        let required = (1 + u32::from(self.slave_latency)) * u32::from(self.max_interval);
        if timeout <= required {
            return Err(Error::InvalidParameter {
                name: "supervision_timeout".to_string(),
                value: format!(
                    "{} too short for latency {} at interval {}",
                    self.supervision_timeout, self.slave_latency, self.max_interval
                ),
            });
        }

        Ok(())
    }

    /// Minimum connection interval in milliseconds.
    pub fn min_interval_ms(&self) -> f64 {
        f64::from(self.min_interval) * 1.25
    }

    /// Maximum connection interval in milliseconds.
    pub fn max_interval_ms(&self) -> f64 {
        f64::from(self.max_interval) * 1.25
    }

    /// Supervision timeout in milliseconds.
    pub fn supervision_timeout_ms(&self) -> u32 {
        u32::from(self.supervision_timeout) * 10
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut buf = data;
        Some(Self {
            min_interval: buf.get_u16_le(),
            max_interval: buf.get_u16_le(),
            slave_latency: buf.get_u16_le(),
            supervision_timeout: buf.get_u16_le(),
        })
    }

    /// Validate and encode to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u16_le(self.min_interval);
        buf.put_u16_le(self.max_interval);
        buf.put_u16_le(self.slave_latency);
        buf.put_u16_le(self.supervision_timeout);
        Ok(buf.to_vec())
    }
}

/// Firmware version reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FirmwareVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
    /// Patch version.
    pub patch: u8,
}

impl FirmwareVersion {
    /// Size of the encoded record in bytes.
    pub const SIZE: usize = 3;

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        match data {
            [major, minor, patch, ..] => Some(Self {
                major: *major,
                minor: *minor,
                patch: *patch,
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// MTU negotiation request.
///
/// Format (3 bytes):
/// - Byte 0: Whether the peripheral should request the MTU itself (0/1)
/// - Bytes 1-2: MTU size (uint16_t, 23-276)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MtuRequest {
    /// Ask the peripheral to initiate the MTU exchange.
    pub peripheral_request: bool,
    /// Requested MTU size.
    pub mtu: u16,
}

impl MtuRequest {
    /// Size of the encoded record in bytes.
    pub const SIZE: usize = 3;
    /// Minimum MTU (the BLE default).
    pub const MTU_MIN: u16 = 23;
    /// Maximum MTU supported by the firmware.
    pub const MTU_MAX: u16 = 276;

    /// Check the MTU against its range.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "MTU size",
            self.mtu.into(),
            Self::MTU_MIN.into(),
            Self::MTU_MAX.into(),
        )
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut buf = data;
        Some(Self {
            peripheral_request: buf.get_u8() != 0,
            mtu: buf.get_u16_le(),
        })
    }

    /// Validate and encode to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u8(u8::from(self.peripheral_request));
        buf.put_u16_le(self.mtu);
        Ok(buf.to_vec())
    }
}
