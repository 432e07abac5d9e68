//! Motion service data structures.
//!
//! Fixed-point sensor fusion outputs and the motion processing configuration.

use bytes::{Buf, BufMut, BytesMut};

use crate::data::check_range;
use crate::error::Result;

const Q30: f64 = (1u32 << 30) as f64;
const Q16: f64 = (1u32 << 16) as f64;
const Q14: f32 = (1u32 << 14) as f32;
const Q11: f32 = (1u32 << 11) as f32;
const Q6: f32 = (1u32 << 6) as f32;
const Q4: f32 = (1u32 << 4) as f32;

/// Motion processing configuration.
///
/// Format (9 bytes):
/// - Bytes 0-1: Step counter interval in ms (uint16_t, 100-5000)
/// - Bytes 2-3: Temperature compensation interval in ms (uint16_t, 100-5000)
/// - Bytes 4-5: Magnetometer compensation interval in ms (uint16_t, 100-1000)
/// - Bytes 6-7: Motion processing frequency in Hz (uint16_t, 5-200)
/// - Byte 8: Wake on motion (0 or 1)
///
/// Older firmware omits the final byte; wake on motion then reads as off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionConfiguration {
    pub step_counter_interval_ms: u16,
    pub temperature_compensation_interval_ms: u16,
    pub magnetometer_compensation_interval_ms: u16,
    pub processing_frequency_hz: u16,
    pub wake_on_motion: bool,
}

impl MotionConfiguration {
    /// Size of the current encoding in bytes.
    pub const SIZE: usize = 9;
    /// Size of the encoding used by firmware without wake on motion.
    pub const LEGACY_SIZE: usize = 8;

    /// Check every field against its range.
    pub fn validate(&self) -> Result<()> {
        check_range(
            "step counter interval",
            self.step_counter_interval_ms.into(),
            100,
            5000,
        )?;
        check_range(
            "temperature compensation interval",
            self.temperature_compensation_interval_ms.into(),
            100,
            5000,
        )?;
        check_range(
            "magnetometer compensation interval",
            self.magnetometer_compensation_interval_ms.into(),
            100,
            1000,
        )?;
        check_range(
            "motion processing frequency",
            self.processing_frequency_hz.into(),
            5,
            200,
        )
    }

    /// Parse from bytes, accepting the legacy 8-byte layout.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::LEGACY_SIZE {
            return None;
        }
        let mut buf = data;
        Some(Self {
            step_counter_interval_ms: buf.get_u16_le(),
            temperature_compensation_interval_ms: buf.get_u16_le(),
            magnetometer_compensation_interval_ms: buf.get_u16_le(),
            processing_frequency_hz: buf.get_u16_le(),
            wake_on_motion: buf.has_remaining() && buf.get_u8() != 0,
        })
    }

    /// Validate and encode to bytes (always the full 9-byte layout).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.validate()?;
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u16_le(self.step_counter_interval_ms);
        buf.put_u16_le(self.temperature_compensation_interval_ms);
        buf.put_u16_le(self.magnetometer_compensation_interval_ms);
        buf.put_u16_le(self.processing_frequency_hz);
        buf.put_u8(u8::from(self.wake_on_motion));
        Ok(buf.to_vec())
    }
}

/// Tap direction reported by the accelerometer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum TapDirection {
    XUp = 1,
    XDown = 2,
    YUp = 3,
    YDown = 4,
    ZUp = 5,
    ZDown = 6,
}

impl TapDirection {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::XUp),
            2 => Some(Self::XDown),
            3 => Some(Self::YUp),
            4 => Some(Self::YDown),
            5 => Some(Self::ZUp),
            6 => Some(Self::ZDown),
            _ => None,
        }
    }
}

/// A tap event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TapEvent {
    pub direction: TapDirection,
    pub count: u8,
}

impl TapEvent {
    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        match data {
            [direction, count, ..] => Some(Self {
                direction: TapDirection::from_raw(*direction)?,
                count: *count,
            }),
            _ => None,
        }
    }
}

/// Device orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Orientation {
    #[default]
    Portrait = 0,
    Landscape = 1,
    ReversePortrait = 2,
    ReverseLandscape = 3,
}

impl Orientation {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Portrait),
            1 => Some(Self::Landscape),
            2 => Some(Self::ReversePortrait),
            3 => Some(Self::ReverseLandscape),
            _ => None,
        }
    }

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        data.first().copied().and_then(Self::from_raw)
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Portrait => write!(f, "Portrait"),
            Self::Landscape => write!(f, "Landscape"),
            Self::ReversePortrait => write!(f, "Reverse portrait"),
            Self::ReverseLandscape => write!(f, "Reverse landscape"),
        }
    }
}

/// Orientation quaternion.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Quaternion {
    pub const SIZE: usize = 16;

    /// Parse from bytes (4 × int32_t, Q30 fixed point).
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut buf = data;
        Some(Self {
            w: f64::from(buf.get_i32_le()) / Q30,
            x: f64::from(buf.get_i32_le()) / Q30,
            y: f64::from(buf.get_i32_le()) / Q30,
            z: f64::from(buf.get_i32_le()) / Q30,
        })
    }
}

/// Step counter reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepCount {
    pub steps: u32,
    /// Time since the counter started, in ms.
    pub time_ms: u32,
}

impl StepCount {
    pub const SIZE: usize = 8;

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut buf = data;
        Some(Self {
            steps: buf.get_u32_le(),
            time_ms: buf.get_u32_le(),
        })
    }
}

/// Raw accelerometer, gyroscope, and compass data.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RawMotion {
    /// Acceleration in G.
    pub accelerometer: [f32; 3],
    /// Angular rate in deg/s.
    pub gyroscope: [f32; 3],
    /// Magnetic field in µT.
    pub compass: [f32; 3],
}

impl RawMotion {
    pub const SIZE: usize = 18;

    /// Parse from bytes (9 × int16_t: accel Q6, gyro Q11, compass Q4).
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut buf = data;
        let mut axes = |scale: f32| {
            [
                f32::from(buf.get_i16_le()) / scale,
                f32::from(buf.get_i16_le()) / scale,
                f32::from(buf.get_i16_le()) / scale,
            ]
        };
        let accelerometer = axes(Q6);
        let gyroscope = axes(Q11);
        let compass = axes(Q4);
        Some(Self {
            accelerometer,
            gyroscope,
            compass,
        })
    }
}

/// Euler angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EulerAngles {
    pub roll: f64,
    pub pitch: f64,
    pub yaw: f64,
}

impl EulerAngles {
    pub const SIZE: usize = 12;

    /// Parse from bytes (3 × int32_t, Q16 fixed point).
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut buf = data;
        Some(Self {
            roll: f64::from(buf.get_i32_le()) / Q16,
            pitch: f64::from(buf.get_i32_le()) / Q16,
            yaw: f64::from(buf.get_i32_le()) / Q16,
        })
    }
}

/// 3×3 rotation matrix, row major.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RotationMatrix(pub [[f32; 3]; 3]);

impl RotationMatrix {
    pub const SIZE: usize = 18;

    /// Parse from bytes (9 × int16_t, Q14 fixed point).
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut buf = data;
        let mut matrix = [[0.0; 3]; 3];
        for row in matrix.iter_mut() {
            for cell in row.iter_mut() {
                *cell = f32::from(buf.get_i16_le()) / Q14;
            }
        }
        Some(Self(matrix))
    }
}

/// Parse a compass heading in degrees (int32_t, Q16 fixed point).
pub fn decode_heading(data: &[u8]) -> Option<f64> {
    if data.len() < 4 {
        return None;
    }
    let mut buf = data;
    Some(f64::from(buf.get_i32_le()) / Q16)
}

/// Gravity vector in m/s².
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GravityVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl GravityVector {
    pub const SIZE: usize = 12;

    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        let mut buf = data;
        Some(Self {
            x: buf.get_f32_le(),
            y: buf.get_f32_le(),
            z: buf.get_f32_le(),
        })
    }
}
