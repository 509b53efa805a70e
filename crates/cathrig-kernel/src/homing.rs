//! Homing: establish a common zero on the transport axes.
//!
//! All axes seek toward their limits together at the homing speed. An axis
//! whose sensor has armed holds there while the others keep going. Once
//! every sensor is armed the counters are zeroed and each axis backs off the
//! configured offset in turn.

use cathrig_hal::{Clock, DigitalIo};
use cathrig_types::{RigConfig, RigError};
use tracing::info;

use crate::axis::MotorAxis;
use crate::guard::MotionGuard;
use crate::motion::const_speed;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomingReport {
    /// Time spent seeking the limits.
    pub seek_ms: u64,
    /// Final position of each axis, in homing order.
    pub positions: Vec<(String, i64)>,
}

/// Home `axes`, backing off in slice order.
pub fn home(
    axes: &mut [&mut MotorAxis],
    io: &dyn DigitalIo,
    clock: &dyn Clock,
    guard: &MotionGuard,
    config: &RigConfig,
) -> Result<HomingReport, RigError> {
    let speed = config.homing_speed();
    info!(axes = axes.len(), speed, "homing");
    for axis in axes.iter_mut() {
        axis.set_speed(speed);
    }

    let started_ms = clock.now_ms();
    let mut budget = guard.budget("homing");
    loop {
        let mut armed = Vec::with_capacity(axes.len());
        for axis in axes.iter() {
            armed.push(axis.limit_state(io)?.is_asserted());
        }
        if armed.iter().all(|a| *a) {
            break;
        }
        if let Err(e) = budget.tick() {
            for axis in axes.iter_mut() {
                axis.stop();
                axis.set_speed(0.0);
            }
            return Err(e);
        }
        let mut emitted = false;
        for (axis, armed) in axes.iter_mut().zip(armed) {
            if !armed {
                emitted |= axis.run_once();
            }
        }
        budget.stepped(emitted);
    }
    let seek_ms = clock.now_ms().saturating_sub(started_ms);
    info!(seek_ms, "limits armed");
    clock.delay_ms(config.homing.settle_ms);

    for axis in axes.iter_mut() {
        axis.stop();
        axis.set_position(0);
    }

    for axis in axes.iter_mut() {
        let offset = config.homing.offset_distance * axis.steps_per_revolution() / axis.distance_per_revolution();
        const_speed(axis, speed, -offset, clock, guard)?;
        info!(axis = axis.name(), offset, "finished homing");
        clock.delay_ms(config.homing.settle_ms);
    }

    Ok(HomingReport {
        seek_ms,
        positions: axes
            .iter()
            .map(|a| (a.name().to_string(), a.position()))
            .collect(),
    })
}
