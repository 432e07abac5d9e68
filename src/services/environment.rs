//! Environment service.

use std::ops::Deref;

use crate::data::{ColorReading, EnvironmentConfiguration, GasReading};
use crate::error::Result;
use crate::peripheral::CallbackHandle;
use crate::protocol::{
    Color, EnvironmentConfigurationCharacteristic, Gas, Humidity, Pressure, Temperature,
};
use crate::services::GattService;
use crate::utils::celsius_to_fahrenheit;

/// Typed access to the environment service.
#[derive(Debug, Clone)]
pub struct EnvironmentService(GattService);

impl EnvironmentService {
    pub(crate) fn new(service: GattService) -> Self {
        Self(service)
    }

    /// Last temperature in °C.
    pub fn temperature(&self) -> Result<Option<f32>> {
        self.value::<Temperature>()
    }

    /// Last temperature in °F.
    pub fn temperature_fahrenheit(&self) -> Result<Option<f64>> {
        Ok(self
            .temperature()?
            .map(|celsius| celsius_to_fahrenheit(f64::from(celsius))))
    }

    /// Last pressure in hPa.
    pub fn pressure(&self) -> Result<Option<f64>> {
        self.value::<Pressure>()
    }

    /// Last relative humidity in percent.
    pub fn humidity(&self) -> Result<Option<u8>> {
        self.value::<Humidity>()
    }

    pub fn gas(&self) -> Result<Option<GasReading>> {
        self.value::<Gas>()
    }

    pub fn color(&self) -> Result<Option<ColorReading>> {
        self.value::<Color>()
    }

    /// Sampling configuration; all zero until read.
    pub fn configuration(&self) -> Result<EnvironmentConfiguration> {
        self.value_or_default::<EnvironmentConfigurationCharacteristic>()
    }

    pub fn set_configuration(&self, configuration: &EnvironmentConfiguration) -> Result<()> {
        self.write::<EnvironmentConfigurationCharacteristic>(configuration)
    }

    /// Subscribe to every sensor reading.
    pub fn start_all_notifications(&self) -> Result<()> {
        self.start_notifications::<Temperature>()?;
        self.start_notifications::<Pressure>()?;
        self.start_notifications::<Humidity>()?;
        self.start_notifications::<Gas>()?;
        self.start_notifications::<Color>()
    }

    /// Register a callback for temperature notifications.
    pub fn on_temperature<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        self.on_update::<Temperature, _>(callback)
    }
}

impl Deref for EnvironmentService {
    type Target = GattService;

    fn deref(&self) -> &GattService {
        &self.0
    }
}
