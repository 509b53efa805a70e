//! `cathrig-types` – shared vocabulary for the catheter insertion rig.
//!
//! Every crate in the workspace speaks in these types: the [`RigError`]
//! fault taxonomy, the [`RigConfig`] tree of tunable rig parameters, and
//! the [`MotionEvent`] records that the motion core journals for the command
//! layer.

pub mod config;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use config::{
    ClampConfig, GeometryConfig, HomingConfig, MotionConfig, RigConfig, SafetyConfig,
};

/// Which end-of-travel sensor of an axis is asserted.
///
/// Positive step counts move the carriage toward [`LimitSide::Right`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitSide {
    Left,
    Right,
}

impl LimitSide {
    /// Sign of a move that travels away from this sensor.
    pub fn away_sign(self) -> i64 {
        match self {
            LimitSide::Left => 1,
            LimitSide::Right => -1,
        }
    }
}

impl std::fmt::Display for LimitSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitSide::Left => write!(f, "left"),
            LimitSide::Right => write!(f, "right"),
        }
    }
}

/// An inserted device gripped by one of the binary linear actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Catheter,
    Guidewire,
}

impl Device {
    /// The device whose grip must hold while this one is released.
    pub fn other(self) -> Device {
        match self {
            Device::Catheter => Device::Guidewire,
            Device::Guidewire => Device::Catheter,
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Catheter => write!(f, "catheter"),
            Device::Guidewire => write!(f, "guidewire"),
        }
    }
}

/// Grip state of a linear clamp actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GripState {
    Clamped,
    Released,
}

/// Phases a limit-aware move passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Moving,
    Recovering,
    HandingOff,
    Resuming,
    Done,
}

/// A journal entry recorded by the motion core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "cathrig-kernel::clamp_system"
    pub source: String,
    pub payload: EventPayload,
}

impl MotionEvent {
    /// Stamp `payload` with a fresh id and the current UTC time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    /// A travel-limit sensor tripped mid-move.
    LimitHit {
        axis: String,
        side: LimitSide,
        position: i64,
    },
    /// A bounded back-off away from an asserted sensor finished.
    BackedOff {
        axis: String,
        side: LimitSide,
        steps: i64,
    },
    /// A move changed phase.
    PhaseChanged { operation: String, phase: Phase },
    /// A linear clamp actuator changed grip.
    Grip { device: Device, state: GripState },
    /// A single-axis interlocked move finished.
    MoveComplete {
        axis: String,
        steps: i64,
        distance: i64,
        recoveries: u32,
        elapsed_ms: u64,
    },
    /// A synchronized dual-axis move finished.
    ///
    /// `residual` is `top_delta × top_dpr + bottom_delta × bottom_dpr`, the
    /// gear-coupling mismatch accumulated by the move in step units.
    SyncComplete {
        top_delta: i64,
        bottom_delta: i64,
        residual: i64,
        recoveries: u32,
        elapsed_ms: u64,
    },
    /// The move aborted with a fault.
    Fault(RigError),
}

/// Fault taxonomy for the rig, from raw driver failures to interlock trips.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RigError {
    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Limit recovery requested on {axis} but no limit sensor is asserted")]
    NoLimitAsserted { axis: String },

    #[error("Limit on {axis} still tripping after {recoveries} recoveries")]
    StuckLimit { axis: String, recoveries: u32 },

    #[error("Grip Violation: cannot release {releasing} while {held} is released")]
    GripViolation { releasing: Device, held: Device },

    #[error("{operation} exceeded its budget of {ticks} ticks")]
    Timeout { operation: String, ticks: u64 },

    #[error("{operation} cancelled")]
    Cancelled { operation: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
