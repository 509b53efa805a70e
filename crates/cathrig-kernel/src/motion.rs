//! Blocking single-axis move primitives.
//!
//! Neither primitive polls limit sensors. They are used where the direction
//! of travel is already known to be safe: limit back-offs, clamp-jaw strokes
//! and the transport moves inside a hand-off.

use cathrig_hal::Clock;
use cathrig_types::RigError;
use tracing::debug;

use crate::axis::MotorAxis;
use crate::guard::{MotionGuard, TickBudget};

/// Diagnostics for one finished primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveReport {
    pub start: i64,
    pub end: i64,
    pub elapsed_ms: u64,
}

impl MoveReport {
    pub fn steps(&self) -> i64 {
        self.end - self.start
    }
}

/// Gate one poll of `axis`, halting it if the budget refuses.
pub(crate) fn tick_or_stop(budget: &mut TickBudget<'_>, axis: &mut MotorAxis) -> Result<(), RigError> {
    budget.tick().inspect_err(|_| {
        axis.stop();
        axis.set_speed(0.0);
    })
}

/// Move `steps` relative to the current position at constant `speed`.
///
/// The sign of `speed` is ignored; direction follows `steps`. Returns once
/// the position equals the target exactly, with the axis stopped and its
/// speed zeroed.
pub fn const_speed(
    axis: &mut MotorAxis,
    speed: f32,
    steps: i64,
    clock: &dyn Clock,
    guard: &MotionGuard,
) -> Result<MoveReport, RigError> {
    let start = axis.position();
    let target = axis.offset_target(steps)?;
    let started_ms = clock.now_ms();

    axis.driver_mut().move_to(target);
    axis.set_speed(speed.abs() * steps.signum() as f32);

    let mut budget = guard.budget("const_speed");
    while axis.position() != target {
        tick_or_stop(&mut budget, axis)?;
        let emitted = axis.run_once();
        budget.stepped(emitted);
    }
    axis.stop();
    axis.set_speed(0.0);

    let elapsed_ms = clock.now_ms().saturating_sub(started_ms);
    debug!(axis = axis.name(), steps, elapsed_ms, "const_speed finished");
    Ok(MoveReport {
        start,
        end: target,
        elapsed_ms,
    })
}

/// Profiled move to an `absolute` position using the axis's configured
/// maximum speed and acceleration.
pub fn with_accel(
    axis: &mut MotorAxis,
    absolute: i64,
    clock: &dyn Clock,
    guard: &MotionGuard,
) -> Result<MoveReport, RigError> {
    let start = axis.position();
    let started_ms = clock.now_ms();
    axis.driver_mut().move_to(absolute);

    let mut budget = guard.budget("with_accel");
    loop {
        tick_or_stop(&mut budget, axis)?;
        let before = axis.position();
        let running = axis.driver_mut().run();
        budget.stepped(axis.position() != before);
        if !running {
            break;
        }
    }

    let elapsed_ms = clock.now_ms().saturating_sub(started_ms);
    debug!(axis = axis.name(), absolute, elapsed_ms, "with_accel finished");
    Ok(MoveReport {
        start,
        end: axis.position(),
        elapsed_ms,
    })
}
