//! [`MotorAxis`] – one motor with its pair of travel-limit sensors.
//!
//! Limit sensors are active-low: a pin reading [`Level::Low`] means the
//! carriage has reached that end of travel. Clamp-jaw axes carry no sensors
//! and always report [`LimitState::Clear`].

use cathrig_hal::{Clock, DigitalIo, Level, PinId, StepperDriver};
use cathrig_types::{LimitSide, MotionConfig, RigError};
use tracing::{debug, warn};

use crate::guard::MotionGuard;
use crate::motion::const_speed;

/// Result of polling an axis's limit sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitState {
    Clear,
    Left,
    Right,
}

impl LimitState {
    pub fn side(self) -> Option<LimitSide> {
        match self {
            LimitState::Clear => None,
            LimitState::Left => Some(LimitSide::Left),
            LimitState::Right => Some(LimitSide::Right),
        }
    }

    pub fn is_asserted(self) -> bool {
        self != LimitState::Clear
    }
}

/// Outcome of [`MotorAxis::recover_from_limit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitRecovery {
    /// Sensor that was asserted.
    pub side: LimitSide,
    /// Signed steps moved away from it.
    pub steps: i64,
}

pub struct MotorAxis {
    name: String,
    driver: Box<dyn StepperDriver>,
    left_limit: Option<PinId>,
    right_limit: Option<PinId>,
    steps_per_revolution: i64,
    distance_per_revolution: i64,
}

impl MotorAxis {
    /// Wrap `driver`, configured with the fast between-move profile.
    pub fn new(
        name: impl Into<String>,
        driver: Box<dyn StepperDriver>,
        motion: &MotionConfig,
        distance_per_revolution: i64,
    ) -> Self {
        let mut axis = Self {
            name: name.into(),
            driver,
            left_limit: None,
            right_limit: None,
            steps_per_revolution: motion.steps_per_revolution,
            distance_per_revolution,
        };
        axis.configure(motion.fast_speed(), motion.acceleration);
        axis
    }

    pub fn with_limits(mut self, left: PinId, right: PinId) -> Self {
        self.left_limit = Some(left);
        self.right_limit = Some(right);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps_per_revolution(&self) -> i64 {
        self.steps_per_revolution
    }

    pub fn distance_per_revolution(&self) -> i64 {
        self.distance_per_revolution
    }

    pub fn configure(&mut self, max_speed: f32, acceleration: f32) {
        self.driver.set_max_speed(max_speed);
        self.driver.set_acceleration(acceleration);
    }

    /// Poll both sensors. Left is checked first and wins a tie.
    pub fn limit_state(&self, io: &dyn DigitalIo) -> Result<LimitState, RigError> {
        if let Some(pin) = self.left_limit {
            if io.read(pin)? == Level::Low {
                return Ok(LimitState::Left);
            }
        }
        if let Some(pin) = self.right_limit {
            if io.read(pin)? == Level::Low {
                return Ok(LimitState::Right);
            }
        }
        Ok(LimitState::Clear)
    }

    pub fn position(&self) -> i64 {
        self.driver.current_position()
    }

    pub fn target(&self) -> i64 {
        self.driver.target_position()
    }

    pub fn set_speed(&mut self, steps_per_sec: f32) {
        self.driver.set_speed(steps_per_sec);
    }

    pub fn speed(&self) -> f32 {
        self.driver.speed()
    }

    /// One constant-speed tick. Returns `true` if a step was emitted.
    pub fn run_once(&mut self) -> bool {
        self.driver.run_speed()
    }

    /// Absolute position `delta` steps from here.
    ///
    /// # Errors
    ///
    /// [`RigError::InvalidConfig`] if the target does not fit the step
    /// counter.
    pub fn offset_target(&self, delta: i64) -> Result<i64, RigError> {
        self.position().checked_add(delta).ok_or_else(|| {
            RigError::InvalidConfig(format!(
                "{}: move of {delta} steps from {} is out of range",
                self.name,
                self.position()
            ))
        })
    }

    /// Set the target `delta` steps from the current position.
    pub fn move_relative(&mut self, delta: i64) -> Result<i64, RigError> {
        let target = self.offset_target(delta)?;
        self.driver.move_to(target);
        Ok(target)
    }

    /// Redefine the current position, e.g. zero after homing.
    pub fn set_position(&mut self, position: i64) {
        self.driver.set_current_position(position);
    }

    pub fn stop(&mut self) {
        self.driver.stop();
    }

    /// Convert a step count to linear distance units.
    ///
    /// Saturates instead of overflowing on extreme step counts.
    pub fn to_distance(&self, steps: i64) -> i64 {
        let distance = i128::from(steps) * i128::from(self.distance_per_revolution)
            / i128::from(self.steps_per_revolution);
        i64::try_from(distance).unwrap_or(if distance < 0 { i64::MIN } else { i64::MAX })
    }

    /// Back-off magnitude for a trip that started from `reference`: the
    /// distance travelled, capped at a quarter revolution.
    pub fn backoff_distance(&self, reference: i64) -> i64 {
        (self.position() - reference)
            .abs()
            .min(self.steps_per_revolution / 4)
    }

    pub(crate) fn driver_mut(&mut self) -> &mut dyn StepperDriver {
        self.driver.as_mut()
    }

    /// Move away from whichever sensor is asserted by
    /// [`backoff_distance`][Self::backoff_distance] steps at `speed`.
    ///
    /// # Errors
    ///
    /// [`RigError::NoLimitAsserted`] if neither sensor is asserted; the axis
    /// is not moved.
    pub fn recover_from_limit(
        &mut self,
        reference: i64,
        speed: f32,
        io: &dyn DigitalIo,
        clock: &dyn Clock,
        guard: &MotionGuard,
    ) -> Result<LimitRecovery, RigError> {
        let Some(side) = self.limit_state(io)?.side() else {
            warn!(axis = %self.name, "recovery requested with no limit asserted");
            return Err(RigError::NoLimitAsserted {
                axis: self.name.clone(),
            });
        };
        let steps = self.backoff_distance(reference) * side.away_sign();
        debug!(axis = %self.name, %side, steps, "backing off limit");
        const_speed(self, speed, steps, clock, guard)?;
        Ok(LimitRecovery { side, steps })
    }
}

impl std::fmt::Debug for MotorAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorAxis")
            .field("name", &self.name)
            .field("position", &self.position())
            .field("left_limit", &self.left_limit)
            .field("right_limit", &self.right_limit)
            .finish()
    }
}
