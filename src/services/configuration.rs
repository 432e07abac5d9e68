//! Configuration service.
//!
//! Device name, advertising, connection, Eddystone, cloud token and MTU
//! settings. Every setter validates its input before anything is written.

use std::ops::Deref;

use crate::data::{
    AdvertisingParameters, ConnectionParameters, FirmwareVersion, MtuRequest, UrlFrame,
};
use crate::error::Result;
use crate::protocol::{
    AdvertisingParametersCharacteristic, CloudToken, ConnectionParametersCharacteristic,
    DeviceName, EddystoneUrl, FirmwareVersionCharacteristic, MtuRequestCharacteristic,
};
use crate::services::GattService;

/// Typed access to the configuration service.
#[derive(Debug, Clone)]
pub struct ConfigurationService(GattService);

impl ConfigurationService {
    pub(crate) fn new(service: GattService) -> Self {
        Self(service)
    }

    /// Advertised device name; empty until read.
    pub fn device_name(&self) -> Result<String> {
        self.value_or_default::<DeviceName>()
    }

    /// Set the advertised device name (at most 10 UTF-16 code units).
    pub fn set_device_name(&self, name: &str) -> Result<()> {
        self.write::<DeviceName>(&name.to_string())
    }

    pub fn advertising_parameters(&self) -> Result<AdvertisingParameters> {
        self.value_or_default::<AdvertisingParametersCharacteristic>()
    }

    /// Set the advertising interval (12-8000) and timeout (0-180 s).
    pub fn set_advertising_parameters(&self, interval: u16, timeout: u8) -> Result<()> {
        self.write::<AdvertisingParametersCharacteristic>(&AdvertisingParameters {
            interval,
            timeout,
        })
    }

    pub fn connection_parameters(&self) -> Result<ConnectionParameters> {
        self.value_or_default::<ConnectionParametersCharacteristic>()
    }

    pub fn set_connection_parameters(&self, parameters: ConnectionParameters) -> Result<()> {
        self.write::<ConnectionParametersCharacteristic>(&parameters)
    }

    /// Eddystone URL frame state; `None` until read.
    pub fn eddystone_url(&self) -> Result<Option<UrlFrame>> {
        self.value::<EddystoneUrl>()
    }

    /// Broadcast `url` in an Eddystone URL frame.
    pub fn set_eddystone_url(&self, url: &str) -> Result<()> {
        self.write::<EddystoneUrl>(&UrlFrame::Url(url.to_string()))
    }

    /// Stop broadcasting the Eddystone URL frame.
    pub fn disable_eddystone_url(&self) -> Result<()> {
        self.write::<EddystoneUrl>(&UrlFrame::Disabled)
    }

    pub fn cloud_token(&self) -> Result<String> {
        self.value_or_default::<CloudToken>()
    }

    pub fn set_cloud_token(&self, token: &str) -> Result<()> {
        self.write::<CloudToken>(&token.to_string())
    }

    pub fn firmware_version(&self) -> Result<Option<FirmwareVersion>> {
        self.value::<FirmwareVersionCharacteristic>()
    }

    pub fn mtu_request(&self) -> Result<MtuRequest> {
        self.value_or_default::<MtuRequestCharacteristic>()
    }

    pub fn set_mtu_request(&self, request: MtuRequest) -> Result<()> {
        self.write::<MtuRequestCharacteristic>(&request)
    }
}

impl Deref for ConfigurationService {
    type Target = GattService;

    fn deref(&self) -> &GattService {
        &self.0
    }
}
