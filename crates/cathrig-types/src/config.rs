//! Rig configuration tree.
//!
//! Every field has a default matching the bench rig, so a partial TOML file
//! (or none at all) yields a usable configuration. Call
//! [`RigConfig::validate`] before handing the config to the motion core.

use serde::{Deserialize, Serialize};

use crate::RigError;

/// Top-level configuration passed to every motion component.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    pub motion: MotionConfig,
    pub homing: HomingConfig,
    pub clamp: ClampConfig,
    pub geometry: GeometryConfig,
    pub safety: SafetyConfig,
}

/// Speed and resolution of the transport axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Constant speed for interlocked moves, in steps/s.
    pub nominal_speed: f32,
    /// Multiplier applied to `nominal_speed` for clamp jaws, hand-off moves
    /// and the idle profile.
    pub fast_factor: f32,
    /// Profile acceleration, in steps/s².
    pub acceleration: f32,
    pub steps_per_revolution: i64,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            nominal_speed: 250.0,
            fast_factor: 4.0,
            acceleration: 500.0,
            steps_per_revolution: 2000,
        }
    }
}

impl MotionConfig {
    pub fn fast_speed(&self) -> f32 {
        self.nominal_speed * self.fast_factor
    }

    /// Bounded back-off cap: a quarter revolution.
    pub fn quarter_revolution(&self) -> i64 {
        self.steps_per_revolution / 4
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomingConfig {
    /// Fraction of `nominal_speed` used while seeking the limits.
    pub speed_factor: f32,
    /// Back-off after the limits arm, in physical units.
    pub offset_distance: i64,
    /// Pause between homing phases.
    pub settle_ms: u64,
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            speed_factor: 0.75,
            offset_distance: 20,
            settle_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClampConfig {
    /// Travel of a stepper clamp jaw between open and closed.
    pub jaw_steps: i64,
    /// Full throw time of a linear clamp actuator.
    pub dwell_ms: u64,
}

impl Default for ClampConfig {
    fn default() -> Self {
        Self {
            jaw_steps: 1000,
            dwell_ms: 2500,
        }
    }
}

/// Mechanical coupling between the top and bottom transports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Top side of the 125:72 gear ratio.
    pub top_ratio: i64,
    /// Bottom side of the 125:72 gear ratio.
    pub bottom_ratio: i64,
    /// Bottom-axis magnitude of the tension-relief pushback.
    pub pushback_bottom_steps: i64,
    pub top_distance_per_revolution: i64,
    pub bottom_distance_per_revolution: i64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            top_ratio: 125,
            bottom_ratio: 72,
            pushback_bottom_steps: 25_000,
            top_distance_per_revolution: 72,
            bottom_distance_per_revolution: 125,
        }
    }
}

impl GeometryConfig {
    /// Scale a bottom-axis step count onto the top axis (integer truncation,
    /// saturating at `±i64::MAX` so the result can always be negated).
    pub fn top_steps_for(&self, bottom_steps: i64) -> i64 {
        let scaled = i128::from(bottom_steps) * i128::from(self.top_ratio) / i128::from(self.bottom_ratio);
        i64::try_from(scaled).unwrap_or(if scaled < 0 { -i64::MAX } else { i64::MAX })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// A top-limit trip during a synchronized move whose bottom request
    /// exceeds this magnitude only backs off, without hand-off or resume.
    /// `None` disables the shortcut.
    pub top_limit_bare_backoff_threshold: Option<i64>,
    /// Limit recoveries allowed while completing one command.
    pub max_recoveries: u32,
    /// Depth of pushback moves nested inside hand-offs.
    pub max_nesting: usize,
    /// Tick budget of any single blocking primitive.
    pub max_ticks: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            top_limit_bare_backoff_threshold: Some(20_000),
            max_recoveries: 8,
            max_nesting: 4,
            max_ticks: 10_000_000,
        }
    }
}

impl RigConfig {
    /// Seek speed used while homing.
    pub fn homing_speed(&self) -> f32 {
        self.motion.nominal_speed * self.homing.speed_factor
    }

    /// Reject configurations the motion core cannot run with.
    pub fn validate(&self) -> Result<(), RigError> {
        if !(self.motion.nominal_speed > 0.0) {
            return Err(RigError::InvalidConfig(format!(
                "motion.nominal_speed must be positive, got {}",
                self.motion.nominal_speed
            )));
        }
        if !(self.motion.fast_factor > 0.0) || !(self.homing.speed_factor > 0.0) {
            return Err(RigError::InvalidConfig(
                "speed factors must be positive".to_string(),
            ));
        }
        if self.motion.steps_per_revolution <= 0 {
            return Err(RigError::InvalidConfig(
                "motion.steps_per_revolution must be positive".to_string(),
            ));
        }
        let g = &self.geometry;
        if g.top_ratio <= 0 || g.bottom_ratio <= 0 {
            return Err(RigError::InvalidConfig(format!(
                "gear ratio {}:{} must be positive",
                g.top_ratio, g.bottom_ratio
            )));
        }
        if g.top_distance_per_revolution <= 0 || g.bottom_distance_per_revolution <= 0 {
            return Err(RigError::InvalidConfig(
                "distance per revolution must be positive".to_string(),
            ));
        }
        if self.safety.max_ticks == 0 {
            return Err(RigError::InvalidConfig(
                "safety.max_ticks must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
