//! Builds a [`ClampSystem`] over the in-process simulator.

use std::sync::Arc;

use cathrig_hal::{Clock, SimRig, SystemClock};
use cathrig_kernel::{
    Assembly, ClampActuator, ClampJaw, ClampSystem, DualAssembly, MotionGuard, MotorAxis, SingleAssembly,
};
use cathrig_types::{Device, LimitSide, RigConfig, RigError};

use crate::config::{AssemblyKind, Config};

// Bench wiring: left/right end stop of each transport, then A/B of each
// linear actuator.
const BOTTOM_LIMITS: (u8, u8) = (2, 3);
const TOP_LIMITS: (u8, u8) = (4, 5);
const CATHETER_PINS: (u8, u8) = (6, 7);
const GUIDEWIRE_PINS: (u8, u8) = (8, 9);

fn transport(sim: &SimRig, name: &str, rig: &RigConfig, dpr: i64, pins: (u8, u8), travel: i64) -> Result<MotorAxis, RigError> {
    let axis = MotorAxis::new(name, Box::new(sim.add_axis(name)), &rig.motion, dpr).with_limits(pins.0, pins.1);
    sim.wire_limit(pins.0, name, LimitSide::Left, -travel)?;
    sim.wire_limit(pins.1, name, LimitSide::Right, travel)?;
    Ok(axis)
}

fn jaw(sim: &SimRig, name: &str, rig: &RigConfig) -> ClampJaw {
    let axis = MotorAxis::new(name, Box::new(sim.add_axis(name)), &rig.motion, 1);
    ClampJaw::new(axis, &rig.clamp, rig.motion.fast_speed())
}

/// Assemble a simulated rig from `cfg`, sharing `guard`'s cancellation
/// token with the caller.
///
/// The returned [`SimRig`] handle observes the same world the system drives.
pub fn build(cfg: &Config, guard: MotionGuard) -> Result<(ClampSystem, SimRig), RigError> {
    let sim = SimRig::new();
    let rig = &cfg.rig;
    let travel = cfg.sim.travel_steps;

    let bottom = transport(
        &sim,
        "bottom",
        rig,
        rig.geometry.bottom_distance_per_revolution,
        BOTTOM_LIMITS,
        travel,
    )?;
    let assembly = match cfg.sim.assembly {
        AssemblyKind::Single => Assembly::Single(SingleAssembly {
            transport: bottom,
            jaw: jaw(&sim, "bottom_jaw", rig),
        }),
        AssemblyKind::Dual => Assembly::Dual(DualAssembly {
            bottom,
            top: transport(&sim, "top", rig, rig.geometry.top_distance_per_revolution, TOP_LIMITS, travel)?,
            bottom_jaw: jaw(&sim, "bottom_jaw", rig),
            top_jaw: jaw(&sim, "top_jaw", rig),
        }),
    };

    sim.pair_outputs(CATHETER_PINS.0, CATHETER_PINS.1);
    sim.pair_outputs(GUIDEWIRE_PINS.0, GUIDEWIRE_PINS.1);
    let clock: Arc<dyn Clock> = if cfg.sim.realtime {
        Arc::new(SystemClock::new())
    } else {
        Arc::new(sim.clock())
    };

    let system = ClampSystem::new(
        assembly,
        ClampActuator::new(Device::Catheter, CATHETER_PINS.0, CATHETER_PINS.1),
        ClampActuator::new(Device::Guidewire, GUIDEWIRE_PINS.0, GUIDEWIRE_PINS.1),
        Box::new(sim.io()),
        clock,
        rig.clone(),
    )?
    .with_guard(guard);
    Ok((system, sim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cathrig_types::GripState;

    #[test]
    fn builds_dual_rig_by_default() {
        let cfg = Config::default();
        let (system, sim) = build(&cfg, MotionGuard::new(cfg.rig.safety.max_ticks)).unwrap();
        assert!(system.assembly().has_top());
        assert_eq!(sim.physical_position("top_jaw"), Some(0));
        assert_eq!(system.grip_state(Device::Catheter), GripState::Clamped);
    }

    #[test]
    fn single_rig_has_no_top() {
        let mut cfg = Config::default();
        cfg.sim.assembly = AssemblyKind::Single;
        let (system, sim) = build(&cfg, MotionGuard::new(1000)).unwrap();
        assert!(!system.assembly().has_top());
        assert_eq!(sim.physical_position("top"), None);
    }

    #[test]
    fn invalid_rig_config_is_rejected() {
        let mut cfg = Config::default();
        cfg.rig.geometry.top_ratio = 0;
        let err = build(&cfg, MotionGuard::new(1000)).err().unwrap();
        assert!(matches!(err, RigError::InvalidConfig(_)));
    }

    #[test]
    fn guard_token_is_shared() {
        let cfg = Config::default();
        let guard = MotionGuard::new(cfg.rig.safety.max_ticks);
        let (mut system, _sim) = build(&cfg, guard.clone()).unwrap();
        guard.cancel();
        let err = system.move_relative(100).unwrap_err();
        assert!(matches!(err, RigError::Cancelled { .. }));
    }

    #[test]
    fn homing_backs_off_from_the_far_stop() {
        let mut cfg = Config::default();
        cfg.sim.travel_steps = 3000;
        let (mut system, sim) = build(&cfg, MotionGuard::new(cfg.rig.safety.max_ticks)).unwrap();
        let report = system.home().unwrap();
        assert_eq!(report.positions, vec![("top".to_string(), -555), ("bottom".to_string(), -320)]);
        assert_eq!(sim.physical_position("bottom"), Some(3000 - 320));
    }
}
