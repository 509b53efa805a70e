//! Interlocked single-axis move.
//!
//! The transport steps toward its target at nominal speed, polling its limit
//! sensors every tick. On a trip it backs off (bounded), hands the device
//! over to the fixed clamps, moves the carriage clear, and resumes with
//! whatever part of the request is still outstanding.

use cathrig_types::{EventPayload, LimitSide, Phase, RigError};
use tracing::{info, warn};

use super::sync::catheter_handoff;
use super::{Assembly, Rig};
use crate::axis::MotorAxis;
use crate::motion::tick_or_stop;

const OPERATION: &str = "move";

/// Progress of one logical move across limit recoveries.
#[derive(Debug)]
struct MoveContext {
    remaining: i64,
    recoveries: u32,
}

pub(super) fn interlocked_move(rig: &mut Rig, assembly: &mut Assembly, steps: i64) -> Result<i64, RigError> {
    let started_ms = rig.clock.now_ms();
    let origin = assembly.transport().position();
    let mut ctx = MoveContext {
        remaining: steps,
        recoveries: 0,
    };

    while ctx.remaining != 0 {
        rig.phase(OPERATION, Phase::Moving);
        let segment_start = assembly.transport().position();
        if run_segment(rig, assembly.transport_mut(), ctx.remaining)?.is_none() {
            break;
        }

        if ctx.recoveries == rig.config.safety.max_recoveries {
            return Err(RigError::StuckLimit {
                axis: assembly.transport().name().to_string(),
                recoveries: ctx.recoveries,
            });
        }
        ctx.recoveries += 1;

        rig.phase(OPERATION, Phase::Recovering);
        let speed = rig.config.homing_speed();
        let transport = assembly.transport_mut();
        let recovery = transport.recover_from_limit(
            segment_start,
            speed,
            rig.io.as_ref(),
            rig.clock.as_ref(),
            &rig.guard,
        )?;
        rig.journal.record(EventPayload::BackedOff {
            axis: transport.name().to_string(),
            side: recovery.side,
            steps: recovery.steps,
        });
        ctx.remaining -= transport.position() - segment_start;

        rig.phase(OPERATION, Phase::HandingOff);
        hand_off(rig, assembly, recovery.side)?;

        info!(remaining = ctx.remaining, "continue the motion");
        rig.phase(OPERATION, Phase::Resuming);
    }
    rig.phase(OPERATION, Phase::Done);

    let transport = assembly.transport();
    let moved = transport.position() - origin;
    let distance = transport.to_distance(moved);
    let elapsed_ms = rig.clock.now_ms().saturating_sub(started_ms);
    info!(axis = transport.name(), moved, distance, elapsed_ms, "move finished");
    rig.journal.record(EventPayload::MoveComplete {
        axis: transport.name().to_string(),
        steps: moved,
        distance,
        recoveries: ctx.recoveries,
        elapsed_ms,
    });
    Ok(distance)
}

/// Step toward `axis.position() + steps` until the target or a limit.
fn run_segment(rig: &mut Rig, axis: &mut MotorAxis, steps: i64) -> Result<Option<LimitSide>, RigError> {
    axis.move_relative(steps)?;
    axis.set_speed(rig.config.motion.nominal_speed * steps.signum() as f32);

    let mut budget = rig.guard.budget(OPERATION);
    while axis.position() != axis.target() {
        if let Some(side) = axis.limit_state(rig.io.as_ref())?.side() {
            axis.stop();
            axis.set_speed(0.0);
            let position = axis.position();
            warn!(axis = axis.name(), %side, position, "limit hit");
            rig.journal.record(EventPayload::LimitHit {
                axis: axis.name().to_string(),
                side,
                position,
            });
            return Ok(Some(side));
        }
        tick_or_stop(&mut budget, axis)?;
        let emitted = axis.run_once();
        budget.stepped(emitted);
    }
    axis.stop();
    axis.set_speed(0.0);
    Ok(None)
}

/// Transfer grip so the carriage can be moved clear of the limit.
fn hand_off(rig: &mut Rig, assembly: &mut Assembly, side: LimitSide) -> Result<(), RigError> {
    let fast = rig.config.motion.fast_speed();
    let clear = 2 * rig.config.motion.steps_per_revolution * side.away_sign();
    match assembly {
        Assembly::Single(single) => rig.guidewire_handoff(&mut single.transport, &mut single.jaw, fast, clear),
        Assembly::Dual(dual) => {
            catheter_handoff(rig, dual, side, 0)?;
            rig.guidewire_handoff(&mut dual.top, &mut dual.top_jaw, fast, clear)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use cathrig_hal::{Level, SimRig};
    use cathrig_types::{Device, GripState, RigConfig};

    fn backoffs(system: &super::super::ClampSystem) -> Vec<i64> {
        system
            .events()
            .filter_map(|e| match &e.payload {
                EventPayload::BackedOff { steps, .. } => Some(*steps),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn move_without_limit_reaches_target() {
        let rig = SimRig::new();
        let mut system = single(&rig, RigConfig::default());
        wire_far_limits(&rig, "bottom", BOTTOM_LIMITS);

        let distance = system.move_relative(500).unwrap();
        assert_eq!(distance, 500 * 125 / 2000);
        assert_eq!(system.assembly().transport().position(), 500);
        assert!(grips(&system).is_empty());
    }

    #[test]
    fn zero_move_is_trivially_done() {
        let rig = SimRig::new();
        let mut system = single(&rig, RigConfig::default());
        assert_eq!(system.move_relative(0).unwrap(), 0);
        assert_eq!(rig.physical_position("bottom"), Some(0));
    }

    #[test]
    fn backoff_below_quarter_revolution() {
        let rig = SimRig::new();
        let mut system = single(&rig, RigConfig::default());
        rig.wire_limit(BOTTOM_LIMITS.1, "bottom", LimitSide::Right, 300).unwrap();

        system.move_relative(1000).unwrap();
        assert_eq!(backoffs(&system), vec![-300]);
        // 300 forward, 300 back, 4000 clear of the limit, then the full 1000.
        assert_eq!(system.assembly().transport().position(), -3000);
    }

    #[test]
    fn single_handoff_cycles_guidewire_only() {
        let rig = SimRig::new();
        let mut system = single(&rig, RigConfig::default());
        // Left sensor reads asserted once the carriage passes 2000.
        rig.wire_limit(BOTTOM_LIMITS.0, "bottom", LimitSide::Right, 2000).unwrap();

        system.move_relative(2500).unwrap();

        assert_eq!(backoffs(&system), vec![500]);
        assert_eq!(
            grips(&system),
            vec![
                (Device::Guidewire, GripState::Released),
                (Device::Guidewire, GripState::Clamped),
            ]
        );
        // Back-off already covered the request; only the clearing move follows.
        assert_eq!(system.assembly().transport().position(), 2500 + 4000);
        assert_eq!(rig.physical_position("bottom_jaw"), Some(0));
    }

    #[test]
    fn dual_handoff_grip_order_and_resume() {
        let rig = SimRig::new();
        let mut system = dual(&rig, RigConfig::default());
        wire_far_limits(&rig, "top", TOP_LIMITS);
        rig.wire_limit(BOTTOM_LIMITS.1, "bottom", LimitSide::Right, 2000).unwrap();

        let distance = system.move_relative(2500).unwrap();

        let grips = grips(&system);
        assert_eq!(
            grips,
            vec![
                (Device::Catheter, GripState::Released),
                (Device::Catheter, GripState::Clamped),
                (Device::Guidewire, GripState::Released),
                (Device::Guidewire, GripState::Clamped),
            ]
        );
        assert_never_both_released(&grips);
        assert_eq!(backoffs(&system), vec![-500]);

        // 2000 → 1500 after back-off, pushback -25000, then the 1000 still owed.
        assert_eq!(system.assembly().transport().position(), -22_500);
        assert_eq!(distance, -22_500 * 125 / 2000);
        // Top: pushback +43402 then cleared 4000 back toward the limit side.
        assert_eq!(rig.physical_position("top"), Some(43_402 - 4000));
        assert_eq!(rig.physical_position("bottom_jaw"), Some(0));
        assert_eq!(rig.physical_position("top_jaw"), Some(0));
    }

    #[test]
    fn actuator_pins_idle_after_handoff() {
        let rig = SimRig::new();
        let mut system = dual(&rig, RigConfig::default());
        wire_far_limits(&rig, "top", TOP_LIMITS);
        rig.wire_limit(BOTTOM_LIMITS.1, "bottom", LimitSide::Right, 800).unwrap();

        system.move_relative(1000).unwrap();
        for pin in [CATHETER_PINS.0, CATHETER_PINS.1, GUIDEWIRE_PINS.0, GUIDEWIRE_PINS.1] {
            assert_eq!(rig.output(pin), Level::Low);
        }
        assert_eq!(rig.overlap_count(), 0);
    }

    #[test]
    fn stuck_sensor_surfaces_as_fault() {
        let rig = SimRig::new();
        let mut system = single(&rig, RigConfig::default());
        rig.force(BOTTOM_LIMITS.1, Some(Level::Low));

        let err = system.move_relative(1000).unwrap_err();
        assert_eq!(
            err,
            RigError::StuckLimit {
                axis: "bottom".to_string(),
                recoveries: 8,
            }
        );
        assert_never_both_released(&grips(&system));
        assert_eq!(system.grip_state(Device::Guidewire), GripState::Clamped);
    }

    #[test]
    fn handoff_refused_while_guidewire_released() {
        let rig = SimRig::new();
        let mut system = dual(&rig, RigConfig::default());
        wire_far_limits(&rig, "top", TOP_LIMITS);
        rig.wire_limit(BOTTOM_LIMITS.1, "bottom", LimitSide::Right, 200).unwrap();
        system.release_guidewire().unwrap();

        let err = system.move_relative(1000).unwrap_err();
        assert!(matches!(err, RigError::GripViolation { releasing: Device::Catheter, .. }));
        assert_eq!(system.grip_state(Device::Catheter), GripState::Clamped);
        // No pushback was attempted and the jaw never closed.
        assert_eq!(rig.physical_position("top"), Some(0));
        assert_eq!(rig.physical_position("bottom_jaw"), Some(0));
    }

    #[test]
    fn guidewire_handoff_refused_while_catheter_released() {
        let rig = SimRig::new();
        let mut system = single(&rig, RigConfig::default());
        rig.wire_limit(BOTTOM_LIMITS.1, "bottom", LimitSide::Right, 2000).unwrap();
        system.release_catheter().unwrap();

        let err = system.move_relative(2500).unwrap_err();
        assert!(matches!(err, RigError::GripViolation { releasing: Device::Guidewire, .. }));
        assert_eq!(system.grip_state(Device::Guidewire), GripState::Clamped);
        assert_eq!(rig.physical_position("bottom_jaw"), Some(0));
    }

    #[test]
    fn completion_is_journaled() {
        let rig = SimRig::new();
        let mut system = single(&rig, RigConfig::default());
        wire_far_limits(&rig, "bottom", BOTTOM_LIMITS);
        system.move_relative(-800).unwrap();

        let last = system.events().last().unwrap();
        assert_eq!(
            last.payload,
            EventPayload::MoveComplete {
                axis: "bottom".to_string(),
                steps: -800,
                distance: -50,
                recoveries: 0,
                elapsed_ms: 0,
            }
        );
    }
}
