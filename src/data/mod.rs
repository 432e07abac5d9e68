//! Data structures for characteristic values.
//!
//! This module contains the typed values carried by every characteristic the
//! core manages, along with their byte layouts. All multi-byte integers are
//! little-endian. Writable records validate their documented ranges in
//! `to_bytes` so that an invalid value never produces a buffer.

pub mod configuration;
pub mod eddystone;
pub mod environment;
pub mod motion;
pub mod ui;

pub use configuration::{
    AdvertisingParameters, ConnectionParameters, FirmwareVersion, MtuRequest,
    CLOUD_TOKEN_MAX_BYTES, DEVICE_NAME_MAX_UTF16,
};
pub use eddystone::UrlFrame;
pub use environment::{ColorReading, EnvironmentConfiguration, GasMode, GasReading, LedCalibration};
pub use motion::{
    EulerAngles, GravityVector, MotionConfiguration, Orientation, Quaternion, RawMotion,
    RotationMatrix, StepCount, TapDirection, TapEvent,
};
pub use ui::{ButtonState, LedColor, LedState, Rgb};

use crate::error::{Error, Result};

/// Check that `value` lies in `min..=max`.
pub(crate) fn check_range(field: &'static str, value: u32, min: u32, max: u32) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}
