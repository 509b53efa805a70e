//! Clamp mechanisms.
//!
//! - [`ClampActuator`] – a two-pin binary linear actuator gripping the
//!   catheter or the guidewire.
//! - [`ClampJaw`] – a small stepper-driven jaw on a transport carriage.

use cathrig_hal::{Clock, DigitalIo, Level, PinId};
use cathrig_types::{ClampConfig, Device, GripState, RigError};
use tracing::debug;

use crate::axis::MotorAxis;
use crate::guard::MotionGuard;
use crate::motion::{MoveReport, const_speed};

// ────────────────────────────────────────────────────────────────────────────
// Linear actuator
// ────────────────────────────────────────────────────────────────────────────

/// Two-pin actuator: A high clamps, B high releases, both low is neutral.
///
/// Every stroke drives the idle pin low before the active pin goes high, so
/// A and B are never high together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClampActuator {
    device: Device,
    pin_a: PinId,
    pin_b: PinId,
}

impl ClampActuator {
    pub fn new(device: Device, pin_a: PinId, pin_b: PinId) -> Self {
        Self {
            device,
            pin_a,
            pin_b,
        }
    }

    /// Drive to `state`, hold for the full `dwell_ms` throw, then go neutral.
    ///
    /// The dwell always elapses, even if the actuator is already there.
    pub fn drive(
        &self,
        state: GripState,
        io: &mut dyn DigitalIo,
        clock: &dyn Clock,
        dwell_ms: u64,
    ) -> Result<(), RigError> {
        let (active, idle) = match state {
            GripState::Clamped => (self.pin_a, self.pin_b),
            GripState::Released => (self.pin_b, self.pin_a),
        };
        io.write(idle, Level::Low)?;
        io.write(active, Level::High)?;
        clock.delay_ms(dwell_ms);
        io.write(self.pin_a, Level::Low)?;
        io.write(self.pin_b, Level::Low)?;
        debug!(device = %self.device, ?state, dwell_ms, "actuator stroke finished");
        Ok(())
    }

    pub fn clamp(&self, io: &mut dyn DigitalIo, clock: &dyn Clock, dwell_ms: u64) -> Result<(), RigError> {
        self.drive(GripState::Clamped, io, clock, dwell_ms)
    }

    pub fn release(&self, io: &mut dyn DigitalIo, clock: &dyn Clock, dwell_ms: u64) -> Result<(), RigError> {
        self.drive(GripState::Released, io, clock, dwell_ms)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stepper jaw
// ────────────────────────────────────────────────────────────────────────────

/// A clamp driven by its own stepper. Negative travel closes the jaw.
#[derive(Debug)]
pub struct ClampJaw {
    axis: MotorAxis,
    stroke: i64,
    speed: f32,
}

impl ClampJaw {
    pub fn new(axis: MotorAxis, clamp: &ClampConfig, speed: f32) -> Self {
        Self {
            axis,
            stroke: clamp.jaw_steps,
            speed,
        }
    }

    pub fn axis(&self) -> &MotorAxis {
        &self.axis
    }

    /// Close the jaw on the device.
    pub fn engage(&mut self, clock: &dyn Clock, guard: &MotionGuard) -> Result<MoveReport, RigError> {
        const_speed(&mut self.axis, self.speed, -self.stroke, clock, guard)
    }

    /// Open the jaw.
    pub fn retract(&mut self, clock: &dyn Clock, guard: &MotionGuard) -> Result<MoveReport, RigError> {
        const_speed(&mut self.axis, self.speed, self.stroke, clock, guard)
    }
}
