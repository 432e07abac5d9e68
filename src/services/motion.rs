//! Motion service.

use std::ops::Deref;

use crate::data::{
    EulerAngles, GravityVector, MotionConfiguration, Orientation, Quaternion, RawMotion,
    RotationMatrix, StepCount, TapEvent,
};
use crate::error::Result;
use crate::peripheral::CallbackHandle;
use crate::protocol::{
    Euler, GravityVectorCharacteristic, Heading, MotionConfigurationCharacteristic,
    OrientationCharacteristic, QuaternionCharacteristic, RawMotionCharacteristic,
    RotationMatrixCharacteristic, StepCounter, Tap,
};
use crate::services::GattService;

/// Typed access to the motion service.
#[derive(Debug, Clone)]
pub struct MotionService(GattService);

impl MotionService {
    pub(crate) fn new(service: GattService) -> Self {
        Self(service)
    }

    /// Motion processing configuration; all zero until read.
    pub fn configuration(&self) -> Result<MotionConfiguration> {
        self.value_or_default::<MotionConfigurationCharacteristic>()
    }

    pub fn set_configuration(&self, configuration: &MotionConfiguration) -> Result<()> {
        self.write::<MotionConfigurationCharacteristic>(configuration)
    }

    pub fn tap(&self) -> Result<Option<TapEvent>> {
        self.value::<Tap>()
    }

    pub fn orientation(&self) -> Result<Option<Orientation>> {
        self.value::<OrientationCharacteristic>()
    }

    pub fn quaternion(&self) -> Result<Option<Quaternion>> {
        self.value::<QuaternionCharacteristic>()
    }

    pub fn step_count(&self) -> Result<Option<StepCount>> {
        self.value::<StepCounter>()
    }

    pub fn raw_motion(&self) -> Result<Option<RawMotion>> {
        self.value::<RawMotionCharacteristic>()
    }

    pub fn euler_angles(&self) -> Result<Option<EulerAngles>> {
        self.value::<Euler>()
    }

    pub fn rotation_matrix(&self) -> Result<Option<RotationMatrix>> {
        self.value::<RotationMatrixCharacteristic>()
    }

    /// Compass heading in degrees.
    pub fn heading(&self) -> Result<Option<f64>> {
        self.value::<Heading>()
    }

    pub fn gravity_vector(&self) -> Result<Option<GravityVector>> {
        self.value::<GravityVectorCharacteristic>()
    }

    pub fn on_orientation_changed<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(Orientation) + Send + Sync + 'static,
    {
        self.on_update::<OrientationCharacteristic, _>(callback)
    }

    pub fn on_tap<F>(&self, callback: F) -> CallbackHandle
    where
        F: Fn(TapEvent) + Send + Sync + 'static,
    {
        self.on_update::<Tap, _>(callback)
    }
}

impl Deref for MotionService {
    type Target = GattService;

    fn deref(&self) -> &GattService {
        &self.0
    }
}
