//! [`ClampSystem`] – transports, clamps and the grip interlock as one unit.
//!
//! A system is either a single-lumen [`Assembly::Single`] (one transport and
//! its jaw) or a dual-lumen [`Assembly::Dual`] (bottom and top transports
//! geared together, each with a jaw). Both shapes share the catheter and
//! guidewire linear actuators.
//!
//! Limit trips never unwind through recursion: each move is a loop over an
//! explicit context that walks Moving → Recovering → HandingOff → Resuming
//! until the request is complete. Only the fixed pushback inside a catheter
//! hand-off nests, and that depth is bounded by
//! [`SafetyConfig::max_nesting`][cathrig_types::SafetyConfig::max_nesting].

mod single;
mod sync;

use std::sync::Arc;

use cathrig_hal::{Clock, DigitalIo};
use cathrig_types::{Device, EventPayload, GripState, MotionEvent, Phase, RigConfig, RigError};
use tracing::{error, info};

use crate::axis::MotorAxis;
use crate::clamp::{ClampActuator, ClampJaw};
use crate::guard::MotionGuard;
use crate::homing::{HomingReport, home};
use crate::interlock::GripInterlock;
use crate::journal::Journal;
use crate::motion::{MoveReport, const_speed};

const JOURNAL_CAPACITY: usize = 1024;

pub struct SingleAssembly {
    pub transport: MotorAxis,
    pub jaw: ClampJaw,
}

pub struct DualAssembly {
    pub bottom: MotorAxis,
    pub top: MotorAxis,
    pub bottom_jaw: ClampJaw,
    pub top_jaw: ClampJaw,
}

/// Mechanical shape of the rig.
pub enum Assembly {
    Single(SingleAssembly),
    Dual(DualAssembly),
}

impl Assembly {
    /// The axis driven by single-axis moves.
    pub fn transport(&self) -> &MotorAxis {
        match self {
            Assembly::Single(s) => &s.transport,
            Assembly::Dual(d) => &d.bottom,
        }
    }

    pub(crate) fn transport_mut(&mut self) -> &mut MotorAxis {
        match self {
            Assembly::Single(s) => &mut s.transport,
            Assembly::Dual(d) => &mut d.bottom,
        }
    }

    /// The jaw on the primary transport.
    pub(crate) fn primary_jaw_mut(&mut self) -> &mut ClampJaw {
        match self {
            Assembly::Single(s) => &mut s.jaw,
            Assembly::Dual(d) => &mut d.bottom_jaw,
        }
    }

    pub fn has_top(&self) -> bool {
        matches!(self, Assembly::Dual(_))
    }

    /// Every axis with its current position, for status displays.
    pub fn positions(&self) -> Vec<(String, i64)> {
        let axes: Vec<&MotorAxis> = match self {
            Assembly::Single(s) => vec![&s.transport, s.jaw.axis()],
            Assembly::Dual(d) => vec![&d.bottom, &d.top, d.bottom_jaw.axis(), d.top_jaw.axis()],
        };
        axes.into_iter()
            .map(|a| (a.name().to_string(), a.position()))
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared context
// ────────────────────────────────────────────────────────────────────────────

/// Everything a move needs besides the axes themselves.
///
/// Kept apart from [`Assembly`] so a hand-off can hold an axis mutably while
/// driving actuators and journaling.
pub(crate) struct Rig {
    catheter: ClampActuator,
    guidewire: ClampActuator,
    io: Box<dyn DigitalIo>,
    clock: Arc<dyn Clock>,
    guard: MotionGuard,
    config: RigConfig,
    interlock: GripInterlock,
    journal: Journal,
}

impl Rig {
    /// Drive a linear actuator, refusing any release the interlock forbids.
    fn grip(&mut self, device: Device, state: GripState) -> Result<(), RigError> {
        self.interlock.check(device, state)?;
        let actuator = match device {
            Device::Catheter => &self.catheter,
            Device::Guidewire => &self.guidewire,
        };
        match state {
            GripState::Clamped => info!(%device, "clamping (linear actuator)"),
            GripState::Released => info!(%device, "releasing (linear actuator)"),
        }
        actuator.drive(state, self.io.as_mut(), self.clock.as_ref(), self.config.clamp.dwell_ms)?;
        self.interlock.commit(device, state);
        self.journal.record(EventPayload::Grip { device, state });
        Ok(())
    }

    fn engage(&self, jaw: &mut ClampJaw, device: Device) -> Result<MoveReport, RigError> {
        info!(%device, jaw = jaw.axis().name(), "clamping (stepper)");
        jaw.engage(self.clock.as_ref(), &self.guard)
    }

    fn retract(&self, jaw: &mut ClampJaw, device: Device) -> Result<MoveReport, RigError> {
        info!(%device, jaw = jaw.axis().name(), "releasing (stepper)");
        jaw.retract(self.clock.as_ref(), &self.guard)
    }

    fn jog(&self, axis: &mut MotorAxis, speed: f32, steps: i64) -> Result<MoveReport, RigError> {
        const_speed(axis, speed, steps, self.clock.as_ref(), &self.guard)
    }

    fn phase(&mut self, operation: &str, phase: Phase) {
        info!(operation, ?phase, "phase");
        self.journal.record(EventPayload::PhaseChanged {
            operation: operation.to_string(),
            phase,
        });
    }

    fn fault(&mut self, err: RigError) -> RigError {
        error!(%err, "motion fault");
        self.journal.record(EventPayload::Fault(err.clone()));
        err
    }

    /// Guidewire hand-off: grip the guidewire with `jaw`, release its linear
    /// clamp, carry the carriage `steps` at `speed`, re-clamp, open the jaw.
    fn guidewire_handoff(
        &mut self,
        carriage: &mut MotorAxis,
        jaw: &mut ClampJaw,
        speed: f32,
        steps: i64,
    ) -> Result<(), RigError> {
        self.interlock.check(Device::Guidewire, GripState::Released)?;
        self.engage(jaw, Device::Guidewire)?;
        self.grip(Device::Guidewire, GripState::Released)?;
        info!(axis = carriage.name(), steps, "moving away");
        self.jog(carriage, speed, steps)?;
        self.grip(Device::Guidewire, GripState::Clamped)?;
        self.retract(jaw, Device::Guidewire)?;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// ClampSystem
// ────────────────────────────────────────────────────────────────────────────

/// The interlocked motion front-end of the rig.
pub struct ClampSystem {
    assembly: Assembly,
    rig: Rig,
}

impl ClampSystem {
    /// Assemble a system. Fails if `config` does not validate.
    pub fn new(
        assembly: Assembly,
        catheter: ClampActuator,
        guidewire: ClampActuator,
        io: Box<dyn DigitalIo>,
        clock: Arc<dyn Clock>,
        config: RigConfig,
    ) -> Result<Self, RigError> {
        config.validate()?;
        let guard = MotionGuard::new(config.safety.max_ticks);
        Ok(Self {
            assembly,
            rig: Rig {
                catheter,
                guidewire,
                io,
                clock,
                guard,
                config,
                interlock: GripInterlock::new(),
                journal: Journal::new("clamp_system", JOURNAL_CAPACITY),
            },
        })
    }

    /// Replace the guard, e.g. with one sharing a Ctrl-C token.
    pub fn with_guard(mut self, guard: MotionGuard) -> Self {
        self.rig.guard = guard;
        self
    }

    pub fn guard(&self) -> &MotionGuard {
        &self.rig.guard
    }

    pub fn assembly(&self) -> &Assembly {
        &self.assembly
    }

    pub fn config(&self) -> &RigConfig {
        &self.rig.config
    }

    pub fn grip_state(&self, device: Device) -> GripState {
        self.rig.interlock.state(device)
    }

    pub fn events(&self) -> impl Iterator<Item = &MotionEvent> {
        self.rig.journal.events()
    }

    pub fn drain_events(&mut self) -> Vec<MotionEvent> {
        self.rig.journal.drain()
    }

    pub fn clamp_catheter(&mut self) -> Result<(), RigError> {
        self.rig.grip(Device::Catheter, GripState::Clamped)
    }

    pub fn release_catheter(&mut self) -> Result<(), RigError> {
        self.rig.grip(Device::Catheter, GripState::Released)
    }

    pub fn clamp_guidewire(&mut self) -> Result<(), RigError> {
        self.rig.grip(Device::Guidewire, GripState::Clamped)
    }

    pub fn release_guidewire(&mut self) -> Result<(), RigError> {
        self.rig.grip(Device::Guidewire, GripState::Released)
    }

    /// Stroke the primary clamp jaw: closes it if `currently_released`,
    /// opens it otherwise. Returns the new released state.
    pub fn toggle_clamp_axis(&mut self, currently_released: bool) -> Result<bool, RigError> {
        let jaw = self.assembly.primary_jaw_mut();
        let result = if currently_released {
            self.rig.engage(jaw, Device::Catheter)
        } else {
            self.rig.retract(jaw, Device::Catheter)
        };
        result.map_err(|e| self.rig.fault(e))?;
        Ok(!currently_released)
    }

    /// Home the transports: top then bottom on a dual assembly.
    pub fn home(&mut self) -> Result<HomingReport, RigError> {
        let Self { assembly, rig } = self;
        let result = match assembly {
            Assembly::Single(s) => home(
                &mut [&mut s.transport],
                rig.io.as_ref(),
                rig.clock.as_ref(),
                &rig.guard,
                &rig.config,
            ),
            Assembly::Dual(d) => home(
                &mut [&mut d.top, &mut d.bottom],
                rig.io.as_ref(),
                rig.clock.as_ref(),
                &rig.guard,
                &rig.config,
            ),
        };
        result.map_err(|e| rig.fault(e))
    }

    /// Interlocked single-axis move of the transport by `steps`.
    ///
    /// Returns the net linear distance moved. See [`single`] for the
    /// recovery choreography.
    pub fn move_relative(&mut self, steps: i64) -> Result<i64, RigError> {
        single::interlocked_move(&mut self.rig, &mut self.assembly, steps)
            .map_err(|e| self.rig.fault(e))
    }

    /// Synchronized move of the top and bottom transports.
    ///
    /// Degrades to [`move_relative`][Self::move_relative]`(bottom_steps)` on
    /// a single assembly.
    pub fn sync_move(&mut self, top_steps: i64, bottom_steps: i64) -> Result<i64, RigError> {
        let result = match &mut self.assembly {
            Assembly::Dual(dual) => sync::synchronized_move(&mut self.rig, dual, top_steps, bottom_steps, 0),
            assembly @ Assembly::Single(_) => {
                info!("no top assembly, moving transport only");
                single::interlocked_move(&mut self.rig, assembly, bottom_steps)
            }
        };
        result.map_err(|e| self.rig.fault(e))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use cathrig_hal::SimRig;
    use cathrig_types::LimitSide;

    pub const BOTTOM_LIMITS: (u8, u8) = (2, 3);
    pub const TOP_LIMITS: (u8, u8) = (4, 5);
    pub const CATHETER_PINS: (u8, u8) = (6, 7);
    pub const GUIDEWIRE_PINS: (u8, u8) = (8, 9);

    fn axis(rig: &SimRig, name: &str, config: &RigConfig, dpr: i64) -> MotorAxis {
        MotorAxis::new(name, Box::new(rig.add_axis(name)), &config.motion, dpr)
    }

    fn jaw(rig: &SimRig, name: &str, config: &RigConfig) -> ClampJaw {
        ClampJaw::new(axis(rig, name, config, 1), &config.clamp, config.motion.fast_speed())
    }

    /// Wire end stops well outside normal travel on every transport.
    pub fn wire_far_limits(rig: &SimRig, axis: &str, pins: (u8, u8)) {
        rig.wire_limit(pins.0, axis, LimitSide::Left, -1_000_000).unwrap();
        rig.wire_limit(pins.1, axis, LimitSide::Right, 1_000_000).unwrap();
    }

    fn finish(rig: &SimRig, assembly: Assembly, config: RigConfig) -> ClampSystem {
        rig.pair_outputs(CATHETER_PINS.0, CATHETER_PINS.1);
        rig.pair_outputs(GUIDEWIRE_PINS.0, GUIDEWIRE_PINS.1);
        ClampSystem::new(
            assembly,
            ClampActuator::new(Device::Catheter, CATHETER_PINS.0, CATHETER_PINS.1),
            ClampActuator::new(Device::Guidewire, GUIDEWIRE_PINS.0, GUIDEWIRE_PINS.1),
            Box::new(rig.io()),
            Arc::new(rig.clock()),
            config,
        )
        .unwrap()
    }

    pub fn single(rig: &SimRig, config: RigConfig) -> ClampSystem {
        let transport = axis(rig, "bottom", &config, config.geometry.bottom_distance_per_revolution)
            .with_limits(BOTTOM_LIMITS.0, BOTTOM_LIMITS.1);
        let jaw = jaw(rig, "bottom_jaw", &config);
        finish(rig, Assembly::Single(SingleAssembly { transport, jaw }), config)
    }

    pub fn dual(rig: &SimRig, config: RigConfig) -> ClampSystem {
        let bottom = axis(rig, "bottom", &config, config.geometry.bottom_distance_per_revolution)
            .with_limits(BOTTOM_LIMITS.0, BOTTOM_LIMITS.1);
        let top = axis(rig, "top", &config, config.geometry.top_distance_per_revolution)
            .with_limits(TOP_LIMITS.0, TOP_LIMITS.1);
        let bottom_jaw = jaw(rig, "bottom_jaw", &config);
        let top_jaw = jaw(rig, "top_jaw", &config);
        finish(
            rig,
            Assembly::Dual(DualAssembly {
                bottom,
                top,
                bottom_jaw,
                top_jaw,
            }),
            config,
        )
    }

    /// Grip transitions recorded in the journal, in order.
    pub fn grips(system: &ClampSystem) -> Vec<(Device, GripState)> {
        system
            .events()
            .filter_map(|e| match &e.payload {
                EventPayload::Grip { device, state } => Some((*device, *state)),
                _ => None,
            })
            .collect()
    }

    /// Assert that no prefix of `grips` has both devices released.
    pub fn assert_never_both_released(grips: &[(Device, GripState)]) {
        let mut lock = GripInterlock::new();
        for (device, state) in grips {
            lock.commit(*device, *state);
            assert!(lock.released_count() <= 1, "both grips released after {grips:?}");
        }
    }
}
