//! Motion service codecs.

use crate::ble::uuids::*;
use crate::data::motion::decode_heading;
use crate::data::{
    EulerAngles, GravityVector, MotionConfiguration, Orientation, Quaternion, RawMotion,
    RotationMatrix, StepCount, TapEvent,
};
use crate::protocol::characteristic;

characteristic! {
    MotionConfigurationCharacteristic: MotionConfiguration,
    service = ServiceKind::Motion,
    uuid = MOTION_CONFIGURATION_UUID,
    name = "Motion configuration",
    decode = MotionConfiguration::from_bytes,
    encode = MotionConfiguration::to_bytes,
}

characteristic! {
    Tap: TapEvent,
    service = ServiceKind::Motion,
    uuid = TAP_UUID,
    name = "Tap",
    decode = TapEvent::from_bytes,
}

characteristic! {
    OrientationCharacteristic: Orientation,
    service = ServiceKind::Motion,
    uuid = ORIENTATION_UUID,
    name = "Orientation",
    decode = Orientation::from_bytes,
}

characteristic! {
    QuaternionCharacteristic: Quaternion,
    service = ServiceKind::Motion,
    uuid = QUATERNION_UUID,
    name = "Quaternion",
    decode = Quaternion::from_bytes,
}

characteristic! {
    StepCounter: StepCount,
    service = ServiceKind::Motion,
    uuid = STEP_COUNTER_UUID,
    name = "Step counter",
    decode = StepCount::from_bytes,
}

characteristic! {
    RawMotionCharacteristic: RawMotion,
    service = ServiceKind::Motion,
    uuid = RAW_MOTION_UUID,
    name = "Raw motion data",
    decode = RawMotion::from_bytes,
}

characteristic! {
    Euler: EulerAngles,
    service = ServiceKind::Motion,
    uuid = EULER_UUID,
    name = "Euler angles",
    decode = EulerAngles::from_bytes,
}

characteristic! {
    RotationMatrixCharacteristic: RotationMatrix,
    service = ServiceKind::Motion,
    uuid = ROTATION_MATRIX_UUID,
    name = "Rotation matrix",
    decode = RotationMatrix::from_bytes,
}

characteristic! {
    /// Compass heading in degrees.
    Heading: f64,
    service = ServiceKind::Motion,
    uuid = HEADING_UUID,
    name = "Heading",
    decode = decode_heading,
}

characteristic! {
    GravityVectorCharacteristic: GravityVector,
    service = ServiceKind::Motion,
    uuid = GRAVITY_VECTOR_UUID,
    name = "Gravity vector",
    decode = GravityVector::from_bytes,
}
