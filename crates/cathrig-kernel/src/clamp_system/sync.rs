//! Synchronized dual-axis move.
//!
//! The top and bottom transports are geared together; requests keep the
//! ratio `top = -bottom × top_ratio / bottom_ratio`. Both axes step in
//! lockstep through a [`CoordinatedMove`] and both sensors are polled before
//! every tick, bottom first.
//!
//! On a trip the pair is returned a quarter revolution clear (or to where the
//! segment started, if the top barely moved), grip is handed over, and the
//! bottom axis's outstanding steps are resumed with a freshly scaled top
//! request.

use cathrig_hal::{CoordinatedMove, StepperDriver};
use cathrig_types::{Device, EventPayload, GeometryConfig, GripState, LimitSide, Phase, RigConfig, RigError};
use tracing::{info, warn};

use super::{DualAssembly, Rig};
use crate::axis::MotorAxis;

const OPERATION: &str = "sync_move";

/// Which sensor ended a coordinated segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tripped {
    Bottom(LimitSide),
    Top(LimitSide),
}

/// A (top, bottom) position pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Pair {
    pub top: i64,
    pub bottom: i64,
}

#[derive(Debug)]
struct SyncContext {
    request: Pair,
    recoveries: u32,
}

fn positions(dual: &DualAssembly) -> Pair {
    Pair {
        top: dual.top.position(),
        bottom: dual.bottom.position(),
    }
}

fn drivers(dual: &mut DualAssembly) -> [&mut dyn StepperDriver; 2] {
    [dual.top.driver_mut(), dual.bottom.driver_mut()]
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

fn halt(dual: &mut DualAssembly) {
    for axis in [&mut dual.top, &mut dual.bottom] {
        axis.stop();
        axis.set_speed(0.0);
    }
}

/// Pushback request for a trip on `side`: the bottom moves away from the
/// sensor by the fixed pushback, the top follows in gear.
pub(crate) fn pushback_steps(geometry: &GeometryConfig, side: LimitSide) -> Pair {
    let bottom = geometry.pushback_bottom_steps * side.away_sign();
    Pair {
        top: -geometry.top_steps_for(bottom),
        bottom,
    }
}

/// Where to park the pair after a trip.
///
/// If the top has travelled no more than a quarter revolution (in top
/// steps) since `start`, the segment is simply undone. Otherwise both axes
/// step a quarter revolution back from `current`, in gear, away from the
/// tripped sensor.
pub(crate) fn return_targets(config: &RigConfig, tripped: Tripped, start: Pair, current: Pair) -> Pair {
    let quarter_bottom = config.motion.quarter_revolution();
    let quarter_top = config.geometry.top_steps_for(quarter_bottom);
    if (current.top - start.top).abs() <= quarter_top {
        return start;
    }
    let bottom_sign = match tripped {
        Tripped::Bottom(side) => side.away_sign(),
        Tripped::Top(side) => -side.away_sign(),
    };
    Pair {
        top: current.top - bottom_sign * quarter_top,
        bottom: current.bottom + bottom_sign * quarter_bottom,
    }
}

pub(super) fn synchronized_move(
    rig: &mut Rig,
    dual: &mut DualAssembly,
    top_steps: i64,
    bottom_steps: i64,
    depth: usize,
) -> Result<i64, RigError> {
    if depth > rig.config.safety.max_nesting {
        return Err(RigError::StuckLimit {
            axis: dual.bottom.name().to_string(),
            recoveries: depth as u32,
        });
    }

    let started_ms = rig.clock.now_ms();
    let origin = positions(dual);
    let nominal = rig.config.motion.nominal_speed;
    let acceleration = rig.config.motion.acceleration;
    let spr = rig.config.motion.steps_per_revolution;
    let mut ctx = SyncContext {
        request: Pair {
            top: top_steps,
            bottom: bottom_steps,
        },
        recoveries: 0,
    };

    while ctx.request != (Pair { top: 0, bottom: 0 }) {
        rig.phase(OPERATION, Phase::Moving);
        dual.top.configure(nominal, acceleration);
        dual.bottom.configure(nominal, acceleration);
        let start = positions(dual);

        let Some(tripped) = run_coordinated(rig, dual, ctx.request)? else {
            break;
        };
        let tripped_axis = match tripped {
            Tripped::Bottom(_) => dual.bottom.name().to_string(),
            Tripped::Top(_) => dual.top.name().to_string(),
        };
        if ctx.recoveries == rig.config.safety.max_recoveries {
            return Err(RigError::StuckLimit {
                axis: tripped_axis,
                recoveries: ctx.recoveries,
            });
        }
        ctx.recoveries += 1;
        rig.phase(OPERATION, Phase::Recovering);

        if let Tripped::Top(_) = tripped {
            let bare = rig
                .config
                .safety
                .top_limit_bare_backoff_threshold
                .is_some_and(|threshold| ctx.request.bottom.abs() > threshold);
            if bare {
                warn!(bottom = ctx.request.bottom, "away from limit, not resuming");
                let recovery = dual.top.recover_from_limit(
                    start.top,
                    rig.config.homing_speed(),
                    rig.io.as_ref(),
                    rig.clock.as_ref(),
                    &rig.guard,
                )?;
                rig.journal.record(EventPayload::BackedOff {
                    axis: tripped_axis,
                    side: recovery.side,
                    steps: recovery.steps,
                });
                break;
            }
        }

        let tripped_at = positions(dual);
        let park = return_targets(&rig.config, tripped, start, tripped_at);
        info!(top = park.top, bottom = park.bottom, "return");
        drive_to(rig, dual, park)?;
        let (side, backed_off) = match tripped {
            Tripped::Bottom(side) => (side, park.bottom - tripped_at.bottom),
            Tripped::Top(side) => (side, park.top - tripped_at.top),
        };
        rig.journal.record(EventPayload::BackedOff {
            axis: tripped_axis,
            side,
            steps: backed_off,
        });

        let outstanding = ctx.request.bottom - (dual.bottom.position() - start.bottom);

        rig.phase(OPERATION, Phase::HandingOff);
        if let Tripped::Bottom(side) = tripped {
            catheter_handoff(rig, dual, side, depth)?;
        }
        rig.guidewire_handoff(&mut dual.top, &mut dual.top_jaw, nominal, spr * side.away_sign())?;

        rig.phase(OPERATION, Phase::Resuming);
        ctx.request = Pair {
            top: -rig.config.geometry.top_steps_for(outstanding),
            bottom: outstanding,
        };
        info!(top = ctx.request.top, bottom = ctx.request.bottom, "continue the motion");
    }

    let fast = rig.config.motion.fast_speed();
    dual.top.configure(fast, acceleration);
    dual.bottom.configure(fast, acceleration);
    rig.phase(OPERATION, Phase::Done);

    let end = positions(dual);
    let top_delta = end.top - origin.top;
    let bottom_delta = end.bottom - origin.bottom;
    let residual = saturate(
        i128::from(top_delta) * i128::from(dual.top.distance_per_revolution())
            + i128::from(bottom_delta) * i128::from(dual.bottom.distance_per_revolution()),
    );
    let distance = residual / spr;
    let elapsed_ms = rig.clock.now_ms().saturating_sub(started_ms);
    info!(top_delta, bottom_delta, distance, elapsed_ms, depth, "sync move finished");
    rig.journal.record(EventPayload::SyncComplete {
        top_delta,
        bottom_delta,
        residual,
        recoveries: ctx.recoveries,
        elapsed_ms,
    });
    Ok(distance)
}

/// Catheter hand-off: grip with the bottom jaw, release the catheter clamp,
/// push both transports back in gear, re-clamp, open the jaw.
pub(super) fn catheter_handoff(
    rig: &mut Rig,
    dual: &mut DualAssembly,
    side: LimitSide,
    depth: usize,
) -> Result<(), RigError> {
    rig.interlock.check(Device::Catheter, GripState::Released)?;
    rig.engage(&mut dual.bottom_jaw, Device::Catheter)?;
    rig.grip(Device::Catheter, GripState::Released)?;
    let pushback = pushback_steps(&rig.config.geometry, side);
    info!(top = pushback.top, bottom = pushback.bottom, "pushback");
    synchronized_move(rig, dual, pushback.top, pushback.bottom, depth + 1)?;
    rig.grip(Device::Catheter, GripState::Clamped)?;
    rig.retract(&mut dual.bottom_jaw, Device::Catheter)?;
    Ok(())
}

/// Step both axes toward `request` (relative), stopping on the first
/// asserted sensor.
fn run_coordinated(rig: &mut Rig, dual: &mut DualAssembly, request: Pair) -> Result<Option<Tripped>, RigError> {
    let targets = [dual.top.offset_target(request.top)?, dual.bottom.offset_target(request.bottom)?];
    let mut coordinated = CoordinatedMove::new();
    coordinated.move_to(&mut drivers(dual), &targets, rig.config.motion.nominal_speed);

    let mut budget = rig.guard.budget(OPERATION);
    loop {
        let tripped = match dual.bottom.limit_state(rig.io.as_ref())?.side() {
            Some(side) => Some(Tripped::Bottom(side)),
            None => dual.top.limit_state(rig.io.as_ref())?.side().map(Tripped::Top),
        };
        if let Some(tripped) = tripped {
            halt(dual);
            record_trip(rig, dual, tripped);
            return Ok(Some(tripped));
        }
        if let Err(e) = budget.tick() {
            halt(dual);
            return Err(e);
        }
        let before = positions(dual);
        let running = coordinated.run(&mut drivers(dual));
        budget.stepped(positions(dual) != before);
        if !running {
            break;
        }
    }
    halt(dual);
    Ok(None)
}

fn record_trip(rig: &mut Rig, dual: &DualAssembly, tripped: Tripped) {
    let (axis, side): (&MotorAxis, LimitSide) = match tripped {
        Tripped::Bottom(side) => (&dual.bottom, side),
        Tripped::Top(side) => (&dual.top, side),
    };
    warn!(axis = axis.name(), %side, position = axis.position(), "limit hit");
    rig.journal.record(EventPayload::LimitHit {
        axis: axis.name().to_string(),
        side,
        position: axis.position(),
    });
}

/// Coordinated move to absolute `target` without sensor polling.
fn drive_to(rig: &mut Rig, dual: &mut DualAssembly, target: Pair) -> Result<(), RigError> {
    let mut coordinated = CoordinatedMove::new();
    coordinated.move_to(
        &mut drivers(dual),
        &[target.top, target.bottom],
        rig.config.motion.nominal_speed,
    );
    let mut budget = rig.guard.budget("sync_return");
    loop {
        if let Err(e) = budget.tick() {
            halt(dual);
            return Err(e);
        }
        let before = positions(dual);
        let running = coordinated.run(&mut drivers(dual));
        budget.stepped(positions(dual) != before);
        if !running {
            break;
        }
    }
    halt(dual);
    Ok(())
}
