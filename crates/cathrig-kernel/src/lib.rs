//! `cathrig-kernel` – Motion & Interlock Core
//!
//! Limit-aware motion for the catheter insertion rig. Everything here runs on
//! one thread, one command at a time; "synchronized" means both transports
//! are stepped within the same tick.
//!
//! # Modules
//!
//! - [`axis`] – [`MotorAxis`][axis::MotorAxis]: one motor plus its two
//!   active-low limit sensors, with the bounded back-off recovery.
//! - [`motion`] – [`const_speed`][motion::const_speed] and
//!   [`with_accel`][motion::with_accel]: blocking relative/absolute moves.
//! - [`homing`] – [`home`][homing::home]: concurrent seek to the limits,
//!   zeroing and fixed back-off.
//! - [`clamp`] – [`ClampActuator`][clamp::ClampActuator] (two-pin linear
//!   actuator) and [`ClampJaw`][clamp::ClampJaw] (stepper-driven jaw).
//! - [`interlock`] – [`GripInterlock`][interlock::GripInterlock]: refuses any
//!   release that would leave both catheter and guidewire ungripped.
//! - [`guard`] – [`MotionGuard`][guard::MotionGuard]: tick budget and
//!   cancellation for every blocking loop.
//! - [`journal`] – [`Journal`][journal::Journal]: bounded log of
//!   [`MotionEvent`][cathrig_types::MotionEvent]s for the command layer.
//! - [`clamp_system`] – [`ClampSystem`][clamp_system::ClampSystem]: the
//!   interlocked single-axis move and the synchronized dual-axis move, with
//!   clamp hand-off and resumption after every limit trip.

pub mod axis;
pub mod clamp;
pub mod clamp_system;
pub mod guard;
pub mod homing;
pub mod interlock;
pub mod journal;
pub mod motion;

pub use axis::{LimitRecovery, LimitState, MotorAxis};
pub use clamp::{ClampActuator, ClampJaw};
pub use clamp_system::{Assembly, ClampSystem, DualAssembly, SingleAssembly};
pub use guard::{MotionGuard, TickBudget};
pub use homing::{HomingReport, home};
pub use interlock::GripInterlock;
pub use journal::Journal;
pub use motion::{MoveReport, const_speed, with_accel};
