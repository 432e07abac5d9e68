//! Characteristic codecs.
//!
//! Each GATT characteristic the core manages is described by a zero-sized
//! marker type implementing [`CharacteristicCodec`]. The marker ties the
//! characteristic UUID and its human-readable name to the typed value and the
//! encode/decode functions from [`crate::data`]. Service objects are generic
//! over these markers, so one service implementation serves every service.

use uuid::Uuid;

use crate::ble::uuids::ServiceKind;
use crate::error::{Error, Result};

pub mod battery;
pub mod configuration;
pub mod environment;
pub mod motion;
pub mod ui;

pub use battery::BatteryLevel;
pub use configuration::{
    AdvertisingParametersCharacteristic, CloudToken, ConnectionParametersCharacteristic,
    DeviceName, EddystoneUrl, FirmwareVersionCharacteristic, MtuRequestCharacteristic,
};
pub use environment::{
    Color, EnvironmentConfigurationCharacteristic, Gas, Humidity, Pressure, Temperature,
};
pub use motion::{
    Euler, GravityVectorCharacteristic, Heading, MotionConfigurationCharacteristic,
    OrientationCharacteristic, QuaternionCharacteristic, RawMotionCharacteristic,
    RotationMatrixCharacteristic, StepCounter, Tap,
};
pub use ui::{Button, Led};

/// Binary codec for one characteristic.
pub trait CharacteristicCodec: Send + Sync + 'static {
    /// Decoded value type.
    type Value: Clone + Send + 'static;

    /// Service the characteristic belongs to.
    const SERVICE: ServiceKind;
    /// Characteristic UUID.
    const UUID: Uuid;
    /// Human-readable name used in errors and logs.
    const NAME: &'static str;

    /// Decode a raw value. Malformed payloads yield `None`.
    fn decode(data: &[u8]) -> Option<Self::Value>;

    /// Validate and encode a value for writing.
    ///
    /// Read-only characteristics keep the default, which refuses the write.
    fn encode(_value: &Self::Value) -> Result<Vec<u8>> {
        Err(Error::NotSupported {
            operation: format!("writing {}", Self::NAME),
        })
    }
}

/// Declare a codec marker type.
macro_rules! characteristic {
    (
        $(#[$meta:meta])*
        $marker:ident: $value:ty,
        service = $service:expr,
        uuid = $uuid:expr,
        name = $name:literal,
        decode = $decode:expr
        $(, encode = $encode:expr)?
        $(,)?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $marker;

        impl $crate::protocol::CharacteristicCodec for $marker {
            type Value = $value;

            const SERVICE: $crate::ble::uuids::ServiceKind = $service;
            const UUID: ::uuid::Uuid = $uuid;
            const NAME: &'static str = $name;

            fn decode(data: &[u8]) -> Option<$value> {
                ($decode)(data)
            }

            $(
                fn encode(value: &$value) -> $crate::error::Result<Vec<u8>> {
                    ($encode)(value)
                }
            )?
        }
    };
}

pub(crate) use characteristic;

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_registered<C: CharacteristicCodec>() {
        let entry = C::SERVICE
            .characteristics()
            .iter()
            .find(|(uuid, _)| *uuid == C::UUID);
        assert_eq!(
            entry.map(|(_, name)| *name),
            Some(C::NAME),
            "{} is not in the {} table",
            C::NAME,
            C::SERVICE
        );
    }

    #[test]
    fn test_every_codec_matches_service_table() {
        assert_registered::<BatteryLevel>();

        assert_registered::<DeviceName>();
        assert_registered::<AdvertisingParametersCharacteristic>();
        assert_registered::<ConnectionParametersCharacteristic>();
        assert_registered::<EddystoneUrl>();
        assert_registered::<CloudToken>();
        assert_registered::<FirmwareVersionCharacteristic>();
        assert_registered::<MtuRequestCharacteristic>();

        assert_registered::<Temperature>();
        assert_registered::<Pressure>();
        assert_registered::<Humidity>();
        assert_registered::<Gas>();
        assert_registered::<Color>();
        assert_registered::<EnvironmentConfigurationCharacteristic>();

        assert_registered::<Led>();
        assert_registered::<Button>();

        assert_registered::<MotionConfigurationCharacteristic>();
        assert_registered::<Tap>();
        assert_registered::<OrientationCharacteristic>();
        assert_registered::<QuaternionCharacteristic>();
        assert_registered::<StepCounter>();
        assert_registered::<RawMotionCharacteristic>();
        assert_registered::<Euler>();
        assert_registered::<RotationMatrixCharacteristic>();
        assert_registered::<Heading>();
        assert_registered::<GravityVectorCharacteristic>();
    }

    #[test]
    fn test_read_only_codecs_refuse_writes() {
        assert!(matches!(
            FirmwareVersionCharacteristic::encode(&Default::default()),
            Err(Error::NotSupported { .. })
        ));
        assert!(matches!(
            Temperature::encode(&21.5),
            Err(Error::NotSupported { .. })
        ));
    }
}
