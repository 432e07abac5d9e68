//! BLE Service and Characteristic UUIDs.
//!
//! Contains all UUID constants used for Thingy communication, plus the
//! well-known characteristic table of every service the core manages.

use uuid::Uuid;

// Battery Service (Standard BLE)
/// Standard BLE Battery Service UUID.
pub const BATTERY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_180f_0000_1000_8000_00805f9b34fb);
/// Battery Level characteristic UUID (Read, Notify).
pub const BATTERY_LEVEL_UUID: Uuid = Uuid::from_u128(0x0000_2a19_0000_1000_8000_00805f9b34fb);

// Configuration Service (Thingy Custom)
/// Thingy Configuration Service UUID. Also the advertised scan signature.
pub const CONFIGURATION_SERVICE_UUID: Uuid =
    Uuid::from_u128(0xef68_0100_9b35_4933_9b10_52ffa9740042);
/// Device name characteristic UUID (Read, Write).
pub const DEVICE_NAME_UUID: Uuid = Uuid::from_u128(0xef68_0101_9b35_4933_9b10_52ffa9740042);
/// Advertising parameters characteristic UUID (Read, Write).
pub const ADVERTISING_PARAMETERS_UUID: Uuid =
    Uuid::from_u128(0xef68_0102_9b35_4933_9b10_52ffa9740042);
/// Connection parameters characteristic UUID (Read, Write).
pub const CONNECTION_PARAMETERS_UUID: Uuid =
    Uuid::from_u128(0xef68_0104_9b35_4933_9b10_52ffa9740042);
/// Eddystone URL characteristic UUID (Read, Write).
pub const EDDYSTONE_URL_UUID: Uuid = Uuid::from_u128(0xef68_0105_9b35_4933_9b10_52ffa9740042);
/// Cloud token characteristic UUID (Read, Write).
pub const CLOUD_TOKEN_UUID: Uuid = Uuid::from_u128(0xef68_0106_9b35_4933_9b10_52ffa9740042);
/// Firmware version characteristic UUID (Read).
pub const FIRMWARE_VERSION_UUID: Uuid = Uuid::from_u128(0xef68_0107_9b35_4933_9b10_52ffa9740042);
/// MTU request characteristic UUID (Read, Write).
pub const MTU_REQUEST_UUID: Uuid = Uuid::from_u128(0xef68_0108_9b35_4933_9b10_52ffa9740042);

// Environment Service (Thingy Custom)
/// Thingy Environment Service UUID.
pub const ENVIRONMENT_SERVICE_UUID: Uuid =
    Uuid::from_u128(0xef68_0200_9b35_4933_9b10_52ffa9740042);
/// Temperature characteristic UUID (Notify).
pub const TEMPERATURE_UUID: Uuid = Uuid::from_u128(0xef68_0201_9b35_4933_9b10_52ffa9740042);
/// Pressure characteristic UUID (Notify).
pub const PRESSURE_UUID: Uuid = Uuid::from_u128(0xef68_0202_9b35_4933_9b10_52ffa9740042);
/// Humidity characteristic UUID (Notify).
pub const HUMIDITY_UUID: Uuid = Uuid::from_u128(0xef68_0203_9b35_4933_9b10_52ffa9740042);
/// Gas (eCO2/TVOC) characteristic UUID (Notify).
pub const GAS_UUID: Uuid = Uuid::from_u128(0xef68_0204_9b35_4933_9b10_52ffa9740042);
/// Color sensor characteristic UUID (Notify).
pub const COLOR_UUID: Uuid = Uuid::from_u128(0xef68_0205_9b35_4933_9b10_52ffa9740042);
/// Environment configuration characteristic UUID (Read, Write).
pub const ENVIRONMENT_CONFIGURATION_UUID: Uuid =
    Uuid::from_u128(0xef68_0206_9b35_4933_9b10_52ffa9740042);

// User Interface Service (Thingy Custom)
/// Thingy User Interface Service UUID.
pub const USER_INTERFACE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0xef68_0300_9b35_4933_9b10_52ffa9740042);
/// LED characteristic UUID (Read, Write).
pub const LED_UUID: Uuid = Uuid::from_u128(0xef68_0301_9b35_4933_9b10_52ffa9740042);
/// Button characteristic UUID (Notify).
pub const BUTTON_UUID: Uuid = Uuid::from_u128(0xef68_0302_9b35_4933_9b10_52ffa9740042);

// Motion Service (Thingy Custom)
/// Thingy Motion Service UUID.
pub const MOTION_SERVICE_UUID: Uuid = Uuid::from_u128(0xef68_0400_9b35_4933_9b10_52ffa9740042);
/// Motion configuration characteristic UUID (Read, Write).
pub const MOTION_CONFIGURATION_UUID: Uuid =
    Uuid::from_u128(0xef68_0401_9b35_4933_9b10_52ffa9740042);
/// Tap characteristic UUID (Notify).
pub const TAP_UUID: Uuid = Uuid::from_u128(0xef68_0402_9b35_4933_9b10_52ffa9740042);
/// Orientation characteristic UUID (Notify).
pub const ORIENTATION_UUID: Uuid = Uuid::from_u128(0xef68_0403_9b35_4933_9b10_52ffa9740042);
/// Quaternion characteristic UUID (Notify).
pub const QUATERNION_UUID: Uuid = Uuid::from_u128(0xef68_0404_9b35_4933_9b10_52ffa9740042);
/// Step counter characteristic UUID (Notify).
pub const STEP_COUNTER_UUID: Uuid = Uuid::from_u128(0xef68_0405_9b35_4933_9b10_52ffa9740042);
/// Raw motion data characteristic UUID (Notify).
pub const RAW_MOTION_UUID: Uuid = Uuid::from_u128(0xef68_0406_9b35_4933_9b10_52ffa9740042);
/// Euler angles characteristic UUID (Notify).
pub const EULER_UUID: Uuid = Uuid::from_u128(0xef68_0407_9b35_4933_9b10_52ffa9740042);
/// Rotation matrix characteristic UUID (Notify).
pub const ROTATION_MATRIX_UUID: Uuid = Uuid::from_u128(0xef68_0408_9b35_4933_9b10_52ffa9740042);
/// Heading characteristic UUID (Notify).
pub const HEADING_UUID: Uuid = Uuid::from_u128(0xef68_0409_9b35_4933_9b10_52ffa9740042);
/// Gravity vector characteristic UUID (Notify).
pub const GRAVITY_VECTOR_UUID: Uuid = Uuid::from_u128(0xef68_040a_9b35_4933_9b10_52ffa9740042);

// DFU Service (Nordic Secure DFU)
/// Nordic DFU Service UUID, advertised while a device is in bootloader mode.
pub const DFU_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_fe59_0000_1000_8000_00805f9b34fb);

/// The logical services managed by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ServiceKind {
    /// Standard battery service.
    Battery,
    /// Device configuration (name, advertising, connection, Eddystone, cloud token).
    Configuration,
    /// Environment sensors (temperature, pressure, humidity, gas, colour).
    Environment,
    /// LED and button.
    UserInterface,
    /// Motion processing (orientation, quaternions, steps, raw IMU data).
    Motion,
}

impl ServiceKind {
    /// All services, in discovery order.
    pub const ALL: [ServiceKind; 5] = [
        Self::Configuration,
        Self::Environment,
        Self::UserInterface,
        Self::Motion,
        Self::Battery,
    ];

    /// Service UUID.
    pub fn uuid(&self) -> Uuid {
        match self {
            Self::Battery => BATTERY_SERVICE_UUID,
            Self::Configuration => CONFIGURATION_SERVICE_UUID,
            Self::Environment => ENVIRONMENT_SERVICE_UUID,
            Self::UserInterface => USER_INTERFACE_SERVICE_UUID,
            Self::Motion => MOTION_SERVICE_UUID,
        }
    }

    /// Look up a service by UUID.
    pub fn from_uuid(uuid: &Uuid) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.uuid() == *uuid)
    }

    /// Get the service name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Battery => "Battery",
            Self::Configuration => "Configuration",
            Self::Environment => "Environment",
            Self::UserInterface => "User Interface",
            Self::Motion => "Motion",
        }
    }

    /// Well-known characteristics of this service as `(uuid, name)` pairs.
    pub fn characteristics(&self) -> &'static [(Uuid, &'static str)] {
        match self {
            Self::Battery => &[(BATTERY_LEVEL_UUID, "Battery level")],
            Self::Configuration => &[
                (DEVICE_NAME_UUID, "Device name"),
                (ADVERTISING_PARAMETERS_UUID, "Advertising parameters"),
                (CONNECTION_PARAMETERS_UUID, "Connection parameters"),
                (EDDYSTONE_URL_UUID, "Eddystone URL"),
                (CLOUD_TOKEN_UUID, "Cloud token"),
                (FIRMWARE_VERSION_UUID, "Firmware version"),
                (MTU_REQUEST_UUID, "MTU request"),
            ],
            Self::Environment => &[
                (TEMPERATURE_UUID, "Temperature"),
                (PRESSURE_UUID, "Pressure"),
                (HUMIDITY_UUID, "Humidity"),
                (GAS_UUID, "Gas"),
                (COLOR_UUID, "Color"),
                (ENVIRONMENT_CONFIGURATION_UUID, "Environment configuration"),
            ],
            Self::UserInterface => &[(LED_UUID, "LED"), (BUTTON_UUID, "Button")],
            Self::Motion => &[
                (MOTION_CONFIGURATION_UUID, "Motion configuration"),
                (TAP_UUID, "Tap"),
                (ORIENTATION_UUID, "Orientation"),
                (QUATERNION_UUID, "Quaternion"),
                (STEP_COUNTER_UUID, "Step counter"),
                (RAW_MOTION_UUID, "Raw motion data"),
                (EULER_UUID, "Euler angles"),
                (ROTATION_MATRIX_UUID, "Rotation matrix"),
                (HEADING_UUID, "Heading"),
                (GRAVITY_VECTOR_UUID, "Gravity vector"),
            ],
        }
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Service signatures to scan for.
pub fn scan_signatures(include_dfu_state: bool) -> Vec<Uuid> {
    let mut signatures = vec![CONFIGURATION_SERVICE_UUID];
    if include_dfu_state {
        signatures.push(DFU_SERVICE_UUID);
    }
    signatures
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        let battery = BATTERY_SERVICE_UUID.to_string();
        assert!(battery.contains("180f"));

        assert_eq!(
            CONFIGURATION_SERVICE_UUID.to_string(),
            "ef680100-9b35-4933-9b10-52ffa9740042"
        );
        assert_eq!(
            GRAVITY_VECTOR_UUID.to_string(),
            "ef68040a-9b35-4933-9b10-52ffa9740042"
        );
    }

    #[test]
    fn test_service_kind_lookup() {
        for kind in ServiceKind::ALL {
            assert_eq!(ServiceKind::from_uuid(&kind.uuid()), Some(kind));
        }
        assert_eq!(ServiceKind::from_uuid(&DFU_SERVICE_UUID), None);
    }

    #[test]
    fn test_characteristic_tables_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for kind in ServiceKind::ALL {
            for (uuid, _) in kind.characteristics() {
                assert!(seen.insert(*uuid), "duplicate characteristic {}", uuid);
            }
        }
    }

    #[test]
    fn test_scan_signatures() {
        assert_eq!(scan_signatures(false), vec![CONFIGURATION_SERVICE_UUID]);
        assert_eq!(
            scan_signatures(true),
            vec![CONFIGURATION_SERVICE_UUID, DFU_SERVICE_UUID]
        );
    }
}
