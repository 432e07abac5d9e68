//! User interface service data structures: the RGB LED and the button.

use bytes::{Buf, BufMut, BytesMut};

use crate::data::check_range;
use crate::error::Result;

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rgb {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Rgb {
    /// Colour used when a hex string cannot be parsed.
    pub const YELLOW: Rgb = Rgb::new(255, 255, 0);

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// Parse a `RRGGBB` hex string, with or without a leading `#`.
    ///
    /// Anything else falls back to [`Rgb::YELLOW`].
    ///
    /// ```
    /// use thingy_ble::data::Rgb;
    ///
    /// assert_eq!(Rgb::from_hex("#00ff80"), Rgb::new(0, 255, 128));
    /// assert_eq!(Rgb::from_hex("fff"), Rgb::YELLOW);
    /// ```
    pub fn from_hex(hex: &str) -> Self {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Self::YELLOW;
        }
        match u32::from_str_radix(digits, 16) {
            Ok(value) => Self::new((value >> 16) as u8, (value >> 8) as u8, value as u8),
            Err(_) => Self::YELLOW,
        }
    }

    /// Lower-case `#rrggbb` representation.
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)
    }
}

/// LED colour presets used by the breathe and one-shot modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum LedColor {
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Purple = 5,
    Cyan = 6,
    White = 7,
}

impl LedColor {
    /// Create from raw byte value.
    pub fn from_raw(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Red),
            2 => Some(Self::Green),
            3 => Some(Self::Yellow),
            4 => Some(Self::Blue),
            5 => Some(Self::Purple),
            6 => Some(Self::Cyan),
            7 => Some(Self::White),
            _ => None,
        }
    }

    /// Convert to raw byte value.
    pub fn to_raw(&self) -> u8 {
        *self as u8
    }
}

/// Mode of the RGB LED.
///
/// Format (mode byte followed by mode-specific parameters):
/// - `0`: off
/// - `1`: constant, R, G, B
/// - `2`: breathe, preset colour, intensity (1-100 %), delay (uint16_t, 50-10000 ms)
/// - `3`: one shot, preset colour, intensity (1-100 %)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LedState {
    #[default]
    Off,
    Constant(Rgb),
    Breathe {
        color: LedColor,
        intensity: u8,
        delay_ms: u16,
    },
    OneShot {
        color: LedColor,
        intensity: u8,
    },
}

impl LedState {
    pub const MODE_OFF: u8 = 0;
    pub const MODE_CONSTANT: u8 = 1;
    pub const MODE_BREATHE: u8 = 2;
    pub const MODE_ONE_SHOT: u8 = 3;

    /// Parse from bytes.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let (&mode, params) = data.split_first()?;
        let mut buf = params;
        match mode {
            Self::MODE_OFF => Some(Self::Off),
            Self::MODE_CONSTANT if buf.remaining() >= 3 => {
                Some(Self::Constant(Rgb::new(buf.get_u8(), buf.get_u8(), buf.get_u8())))
            }
            Self::MODE_BREATHE if buf.remaining() >= 4 => Some(Self::Breathe {
                color: LedColor::from_raw(buf.get_u8())?,
                intensity: buf.get_u8(),
                delay_ms: buf.get_u16_le(),
            }),
            Self::MODE_ONE_SHOT if buf.remaining() >= 2 => Some(Self::OneShot {
                color: LedColor::from_raw(buf.get_u8())?,
                intensity: buf.get_u8(),
            }),
            _ => None,
        }
    }

    /// Validate and encode to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = BytesMut::with_capacity(5);
        match *self {
            Self::Off => buf.put_u8(Self::MODE_OFF),
            Self::Constant(rgb) => {
                buf.put_u8(Self::MODE_CONSTANT);
                buf.put_u8(rgb.red);
                buf.put_u8(rgb.green);
                buf.put_u8(rgb.blue);
            }
            Self::Breathe {
                color,
                intensity,
                delay_ms,
            } => {
                check_range("LED intensity", intensity.into(), 1, 100)?;
                check_range("LED breathe delay", delay_ms.into(), 50, 10_000)?;
                buf.put_u8(Self::MODE_BREATHE);
                buf.put_u8(color.to_raw());
                buf.put_u8(intensity);
                buf.put_u16_le(delay_ms);
            }
            Self::OneShot { color, intensity } => {
                check_range("LED intensity", intensity.into(), 1, 100)?;
                buf.put_u8(Self::MODE_ONE_SHOT);
                buf.put_u8(color.to_raw());
                buf.put_u8(intensity);
            }
        }
        Ok(buf.to_vec())
    }
}

/// State of the physical button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ButtonState {
    #[default]
    Released,
    Pressed,
}

impl ButtonState {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        match data.first()? {
            0 => Some(Self::Released),
            1 => Some(Self::Pressed),
            _ => None,
        }
    }
}

/// Parse a battery level in percent.
pub fn decode_battery_level(data: &[u8]) -> Option<u8> {
    data.first().copied().filter(|level| *level <= 100)
}
