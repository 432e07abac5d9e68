//! Configuration service codecs.

use crate::ble::uuids::*;
use crate::data::configuration::{decode_text, encode_cloud_token, encode_device_name};
use crate::data::{
    AdvertisingParameters, ConnectionParameters, FirmwareVersion, MtuRequest, UrlFrame,
};
use crate::protocol::characteristic;

characteristic! {
    /// Advertised device name.
    DeviceName: String,
    service = ServiceKind::Configuration,
    uuid = DEVICE_NAME_UUID,
    name = "Device name",
    decode = decode_text,
    encode = |name: &String| encode_device_name(name),
}

characteristic! {
    AdvertisingParametersCharacteristic: AdvertisingParameters,
    service = ServiceKind::Configuration,
    uuid = ADVERTISING_PARAMETERS_UUID,
    name = "Advertising parameters",
    decode = AdvertisingParameters::from_bytes,
    encode = AdvertisingParameters::to_bytes,
}

characteristic! {
    ConnectionParametersCharacteristic: ConnectionParameters,
    service = ServiceKind::Configuration,
    uuid = CONNECTION_PARAMETERS_UUID,
    name = "Connection parameters",
    decode = ConnectionParameters::from_bytes,
    encode = ConnectionParameters::to_bytes,
}

characteristic! {
    /// Eddystone URL frame; an empty value means the frame is off.
    EddystoneUrl: UrlFrame,
    service = ServiceKind::Configuration,
    uuid = EDDYSTONE_URL_UUID,
    name = "Eddystone URL",
    decode = UrlFrame::from_bytes,
    encode = UrlFrame::to_bytes,
}

characteristic! {
    CloudToken: String,
    service = ServiceKind::Configuration,
    uuid = CLOUD_TOKEN_UUID,
    name = "Cloud token",
    decode = decode_text,
    encode = |token: &String| encode_cloud_token(token),
}

characteristic! {
    FirmwareVersionCharacteristic: FirmwareVersion,
    service = ServiceKind::Configuration,
    uuid = FIRMWARE_VERSION_UUID,
    name = "Firmware version",
    decode = FirmwareVersion::from_bytes,
}

characteristic! {
    MtuRequestCharacteristic: MtuRequest,
    service = ServiceKind::Configuration,
    uuid = MTU_REQUEST_UUID,
    name = "MTU request",
    decode = MtuRequest::from_bytes,
    encode = MtuRequest::to_bytes,
}
