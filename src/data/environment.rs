//! Environment service data structures.
//!
//! Sensor readings (temperature, pressure, humidity, gas, colour) and the
//! sampling configuration record.

use bytes::{Buf, BufMut, BytesMut};

use crate::data::check_range;
use crate::error::{Error, Result};

/// Parse a temperature reading in °C.
///
/// Format (2 bytes): integer part (int8_t) + hundredths (uint8_t).
pub fn decode_temperature(data: &[u8]) -> Option<f32> {
    if data.len() < 2 {
        return None;
    }
    let mut buf = data;
    let integer = buf.get_i8();
    let decimal = buf.get_u8();
    Some(f32::from(integer) + f32::from(decimal) / 100.0)
}

/// Parse a pressure reading in hPa.
///
/// Format (5 bytes): integer part (int32_t) + hundredths (uint8_t).
pub fn decode_pressure(data: &[u8]) -> Option<f64> {
    if data.len() < 5 {
        return None;
    }
    let mut buf = data;
    let integer = buf.get_i32_le();
    let decimal = buf.get_u8();
    Some(f64::from(integer) + f64::from(decimal) / 100.0)
}

/// Parse a relative humidity reading in percent.
pub fn decode_humidity(data: &[u8]) -> Option<u8> {
    data.first().copied().filter(|humidity| *humidity <= 100)
}

/// Air quality reading from the gas sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GasReading {
    /// Equivalent CO2 in ppm.
    pub eco2_ppm: u16,
    /// Total volatile organic compounds in ppb.
    pub tvoc_ppb: u16,
}

impl GasReading {
    /// Size of the encoded reading in bytes.
    pub const SIZE: usize = 4;

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut buf = data;
        Some(Self {
            eco2_ppm: buf.get_u16_le(),
            tvoc_ppb: buf.get_u16_le(),
        })
    }
}

/// Raw reading from the colour sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColorReading {
    /// Red channel.
    pub red: u16,
    /// Green channel.
    pub green: u16,
    /// Blue channel.
    pub blue: u16,
    /// Clear (unfiltered) channel.
    pub clear: u16,
}

impl ColorReading {
    /// Size of the encoded reading in bytes.
    pub const SIZE: usize = 8;

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut buf = data;
        Some(Self {
            red: buf.get_u16_le(),
            green: buf.get_u16_le(),
            blue: buf.get_u16_le(),
            clear: buf.get_u16_le(),
        })
    }

    /// Normalised RGB in `0.0..=1.0`, relative to the clear channel.
    ///
    /// Returns `None` when the clear channel is zero (no light).
    pub fn normalized(&self) -> Option<[f32; 3]> {
        if self.clear == 0 {
            return None;
        }
        let clear = f32::from(self.clear);
        Some([
            (f32::from(self.red) / clear).min(1.0),
            (f32::from(self.green) / clear).min(1.0),
            (f32::from(self.blue) / clear).min(1.0),
        ])
    }
}

/// Gas sensor sampling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum GasMode {
    /// Sample every second.
    #[default]
    Interval1Sec = 1,
    /// Sample every 10 seconds.
    Interval10Sec = 2,
    /// Sample every 60 seconds.
    Interval60Sec = 3,
}

impl GasMode {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Interval1Sec),
            2 => Some(Self::Interval10Sec),
            3 => Some(Self::Interval60Sec),
            _ => None,
        }
    }

    /// Convert to raw byte value.
    pub fn to_raw(&self) -> u8 {
        *self as u8
    }
}

/// Colour sensor LED calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LedCalibration {
    /// Red LED intensity.
    pub red: u8,
    /// Green LED intensity.
    pub green: u8,
    /// Blue LED intensity.
    pub blue: u8,
}

impl Default for LedCalibration {
    /// Factory calibration, also assumed for firmware that predates the field.
    fn default() -> Self {
        Self {
            red: 103,
            green: 78,
            blue: 29,
        }
    }
}

/// Environment sampling configuration.
///
/// Format (12 bytes):
/// - Bytes 0-1: Temperature interval in ms (uint16_t, 100-60000)
/// - Bytes 2-3: Pressure interval in ms (uint16_t, 50-60000)
/// - Bytes 4-5: Humidity interval in ms (uint16_t, 100-60000)
/// - Bytes 6-7: Colour interval in ms (uint16_t, 200-60000)
/// - Byte 8: Gas mode (1-3)
/// - Bytes 9-11: Colour sensor LED calibration (R, G, B)
///
/// Older firmware sends only the first 9 bytes; the calibration then falls
/// back to [`LedCalibration::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvironmentConfiguration {
    /// Temperature sampling interval in ms.
    pub temperature_interval_ms: u16,
    /// Pressure sampling interval in ms.
    pub pressure_interval_ms: u16,
    /// Humidity sampling interval in ms.
    pub humidity_interval_ms: u16,
    /// Colour sampling interval in ms.
    pub color_interval_ms: u16,
    /// Gas sensor mode.
    pub gas_mode: GasMode,
    /// Colour sensor LED calibration.
    pub led_calibration: LedCalibration,
}

impl EnvironmentConfiguration {
    /// Size of the current encoding in bytes.
    pub const SIZE: usize = 12;
    /// Size of the encoding used by firmware without LED calibration.
    pub const LEGACY_SIZE: usize = 9;
    /// Longest sampling interval.
    pub const INTERVAL_MAX: u16 = 60_000;

    /// Check every field against its range.
    pub fn validate(&self) -> Result<()> {
        let max = u32::from(Self::INTERVAL_MAX);
        check_range(
            "temperature interval",
            self.temperature_interval_ms.into(),
            100,
            max,
        )?;
        check_range("pressure interval", self.pressure_interval_ms.into(), 50, max)?;
        check_range("humidity interval", self.humidity_interval_ms.into(), 100, max)?;
        check_range("color interval", self.color_interval_ms.into(), 200, max)
    }

    /// Parse from bytes, accepting the legacy 9-byte layout.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::LEGACY_SIZE {
            return None;
        }
        let mut buf = data;
        let temperature_interval_ms = buf.get_u16_le();
        let pressure_interval_ms = buf.get_u16_le();
        let humidity_interval_ms = buf.get_u16_le();
        let color_interval_ms = buf.get_u16_le();
        let gas_mode = GasMode::from_raw(buf.get_u8())?;

        let led_calibration = if buf.remaining() >= 3 {
            LedCalibration {
                red: buf.get_u8(),
                green: buf.get_u8(),
                blue: buf.get_u8(),
            }
        } else {
            LedCalibration::default()
        };

        Some(Self {
            temperature_interval_ms,
            pressure_interval_ms,
            humidity_interval_ms,
            color_interval_ms,
            gas_mode,
            led_calibration,
        })
    }

    /// Validate and encode to bytes (always the full 12-byte layout).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u16_le(self.temperature_interval_ms);
        buf.put_u16_le(self.pressure_interval_ms);
        buf.put_u16_le(self.humidity_interval_ms);
        buf.put_u16_le(self.color_interval_ms);
        buf.put_u8(self.gas_mode.to_raw());
        buf.put_u8(self.led_calibration.red);
        buf.put_u8(self.led_calibration.green);
        buf.put_u8(self.led_calibration.blue);
        Ok(buf.to_vec())
    }
}

impl TryFrom<&[u8]> for EnvironmentConfiguration {
    type Error = Error;

    fn try_from(data: &[u8]) -> Result<Self> {
        Self::from_bytes(data).ok_or_else(|| Error::InvalidParameter {
            name: "environment configuration".to_string(),
            value: format!("{:02X?}", data),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn sample() -> EnvironmentConfiguration {
        EnvironmentConfiguration {
            temperature_interval_ms: 1000,
            pressure_interval_ms: 500,
            humidity_interval_ms: 2000,
            color_interval_ms: 1500,
            gas_mode: GasMode::Interval10Sec,
            led_calibration: LedCalibration {
                red: 1,
                green: 2,
                blue: 3,
            },
        }
    }

    #[test]
    fn test_temperature_scale() {
        assert_eq!(decode_temperature(&[23, 50]), Some(23.5));
        let negative = decode_temperature(&[0xfb, 25]).unwrap();
        assert!((negative - (-4.75)).abs() < 0.001);
        assert_eq!(decode_temperature(&[23]), None);
    }

    #[test]
    fn test_pressure_scale() {
        let pressure = decode_pressure(&[0xf5, 0x03, 0x00, 0x00, 25]).unwrap();
        assert!((pressure - 1013.25).abs() < 1e-9);
        assert_eq!(decode_pressure(&[0xf5, 0x03, 0x00, 0x00]), None);
    }

    #[test]
    fn test_humidity() {
        assert_eq!(decode_humidity(&[45]), Some(45));
        assert_eq!(decode_humidity(&[101]), None);
        assert_eq!(decode_humidity(&[]), None);
    }

    #[test]
    fn test_gas_and_color() {
        assert_eq!(
            GasReading::from_bytes(&[0x90, 0x01, 0x0a, 0x00]),
            Some(GasReading {
                eco2_ppm: 400,
                tvoc_ppb: 10
            })
        );

        let color = ColorReading::from_bytes(&[10, 0, 20, 0, 30, 0, 40, 0]).unwrap();
        assert_eq!(color.clear, 40);
        assert_eq!(color.normalized(), Some([0.25, 0.5, 0.75]));
        assert_eq!(ColorReading::default().normalized(), None);
    }

    #[test]
    fn test_configuration_layout() {
        let bytes = sample().to_bytes().unwrap();
        assert_eq!(
            bytes,
            vec![0xe8, 0x03, 0xf4, 0x01, 0xd0, 0x07, 0xdc, 0x05, 0x02, 1, 2, 3]
        );
        assert_eq!(EnvironmentConfiguration::from_bytes(&bytes), Some(sample()));
    }

    #[test]
    fn test_legacy_configuration_uses_default_calibration() {
        let bytes = sample().to_bytes().unwrap();
        let legacy = EnvironmentConfiguration::from_bytes(&bytes[..9]).unwrap();
        assert_eq!(legacy.led_calibration, LedCalibration::default());
        assert_eq!(legacy.temperature_interval_ms, 1000);
        assert_eq!(legacy.gas_mode, GasMode::Interval10Sec);

        // Partial calibration bytes are treated as absent
        let partial = EnvironmentConfiguration::from_bytes(&bytes[..11]).unwrap();
        assert_eq!(partial.led_calibration, LedCalibration::default());
    }

    #[test]
    fn test_malformed_configuration() {
        assert_eq!(EnvironmentConfiguration::from_bytes(&[0; 8]), None);

        let mut bytes = sample().to_bytes().unwrap();
        bytes[8] = 7;
        assert_eq!(EnvironmentConfiguration::from_bytes(&bytes), None);
        assert!(EnvironmentConfiguration::try_from(&bytes[..]).is_err());
    }

    #[test]
    fn test_configuration_ranges() {
        let config = EnvironmentConfiguration {
            pressure_interval_ms: 49,
            ..sample()
        };
        assert!(matches!(
            config.to_bytes(),
            Err(Error::OutOfRange {
                field: "pressure interval",
                ..
            })
        ));

        let config = EnvironmentConfiguration {
            color_interval_ms: 60_001,
            ..sample()
        };
        assert!(config.to_bytes().is_err());
    }

    proptest! {
        #[test]
        fn prop_legacy_decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..16)) {
            let _ = EnvironmentConfiguration::from_bytes(&data);
        }
    }
}
