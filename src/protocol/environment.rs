//! Environment service codecs.

use crate::ble::uuids::*;
use crate::data::environment::{decode_humidity, decode_pressure, decode_temperature};
use crate::data::{ColorReading, EnvironmentConfiguration, GasReading};
use crate::protocol::characteristic;

characteristic! {
    /// Temperature in °C.
    Temperature: f32,
    service = ServiceKind::Environment,
    uuid = TEMPERATURE_UUID,
    name = "Temperature",
    decode = decode_temperature,
}

characteristic! {
    /// Pressure in hPa.
    Pressure: f64,
    service = ServiceKind::Environment,
    uuid = PRESSURE_UUID,
    name = "Pressure",
    decode = decode_pressure,
}

characteristic! {
    /// Relative humidity in percent.
    Humidity: u8,
    service = ServiceKind::Environment,
    uuid = HUMIDITY_UUID,
    name = "Humidity",
    decode = decode_humidity,
}

characteristic! {
    Gas: GasReading,
    service = ServiceKind::Environment,
    uuid = GAS_UUID,
    name = "Gas",
    decode = GasReading::from_bytes,
}

characteristic! {
    Color: ColorReading,
    service = ServiceKind::Environment,
    uuid = COLOR_UUID,
    name = "Color",
    decode = ColorReading::from_bytes,
}

characteristic! {
    EnvironmentConfigurationCharacteristic: EnvironmentConfiguration,
    service = ServiceKind::Environment,
    uuid = ENVIRONMENT_CONFIGURATION_UUID,
    name = "Environment configuration",
    decode = EnvironmentConfiguration::from_bytes,
    encode = EnvironmentConfiguration::to_bytes,
}
