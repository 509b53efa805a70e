//! In-process simulation rig for headless testing without physical hardware.
//!
//! [`SimRig`] owns a shared simulated world. Steppers created with
//! [`SimRig::add_axis`] move carriages in that world; limit sensors wired
//! with [`SimRig::wire_limit`] read active-low according to the carriage's
//! *physical* position, so re-zeroing a driver never moves its end stops.
//!
//! # Example
//!
//! ```rust
//! use cathrig_hal::sim::SimRig;
//! use cathrig_hal::{DigitalIo, Level, StepperDriver};
//! use cathrig_types::LimitSide;
//!
//! let rig = SimRig::new();
//! let mut axis = rig.add_axis("bottom");
//! rig.wire_limit(3, "bottom", LimitSide::Right, 2).unwrap();
//! let io = rig.io();
//!
//! axis.set_speed(100.0);
//! axis.run_speed();
//! assert_eq!(io.read(3).unwrap(), Level::High);
//! axis.run_speed();
//! assert_eq!(io.read(3).unwrap(), Level::Low);
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cathrig_types::{LimitSide, RigError};
use tracing::warn;

use crate::clock::Clock;
use crate::io::{DigitalIo, Level, PinId};
use crate::stepper::StepperDriver;

// ────────────────────────────────────────────────────────────────────────────
// World state
// ────────────────────────────────────────────────────────────────────────────

/// One recorded output-pin write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinWrite {
    pub pin: PinId,
    pub level: Level,
    pub at_ms: u64,
}

struct SimAxis {
    name: String,
    physical: i64,
    /// Driver counter = physical - offset.
    offset: i64,
    max_speed: f32,
    acceleration: f32,
}

struct LimitWiring {
    axis: usize,
    side: LimitSide,
    trip_at: i64,
}

#[derive(Default)]
struct SimWorld {
    axes: Vec<SimAxis>,
    limits: HashMap<PinId, LimitWiring>,
    forced: HashMap<PinId, Level>,
    outputs: HashMap<PinId, Level>,
    pairs: Vec<(PinId, PinId)>,
    writes: Vec<PinWrite>,
    overlaps: usize,
}

impl SimWorld {
    fn axis_index(&self, name: &str) -> Option<usize> {
        self.axes.iter().position(|a| a.name == name)
    }

    fn read(&self, pin: PinId) -> Level {
        if let Some(level) = self.forced.get(&pin) {
            return *level;
        }
        if let Some(wiring) = self.limits.get(&pin) {
            let physical = self.axes[wiring.axis].physical;
            let asserted = match wiring.side {
                LimitSide::Left => physical <= wiring.trip_at,
                LimitSide::Right => physical >= wiring.trip_at,
            };
            return if asserted { Level::Low } else { Level::High };
        }
        // Outputs read back; unconnected inputs idle high on their pull-ups.
        self.outputs.get(&pin).copied().unwrap_or(Level::High)
    }
}

fn lock(world: &Mutex<SimWorld>) -> MutexGuard<'_, SimWorld> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// SimRig
// ────────────────────────────────────────────────────────────────────────────

/// Handle on a simulated rig. Clones share the same world.
#[derive(Clone, Default)]
pub struct SimRig {
    world: Arc<Mutex<SimWorld>>,
    clock: SimClock,
}

impl SimRig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a carriage at physical position 0 and return its driver.
    pub fn add_axis(&self, name: impl Into<String>) -> SimStepper {
        let name = name.into();
        let mut world = lock(&self.world);
        world.axes.push(SimAxis {
            name: name.clone(),
            physical: 0,
            offset: 0,
            max_speed: 1.0,
            acceleration: 1.0,
        });
        SimStepper {
            id: name,
            world: Arc::clone(&self.world),
            axis: world.axes.len() - 1,
            speed: 0.0,
            target: 0,
        }
    }

    /// Wire an active-low end stop on `pin` that asserts once `axis`
    /// physically reaches `trip_at` from the inside of its travel.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::HardwareFault`] if `axis` was never added.
    pub fn wire_limit(
        &self,
        pin: PinId,
        axis: &str,
        side: LimitSide,
        trip_at: i64,
    ) -> Result<(), RigError> {
        let mut world = lock(&self.world);
        let index = world.axis_index(axis).ok_or_else(|| RigError::HardwareFault {
            component: axis.to_string(),
            details: format!("axis '{axis}' is not simulated"),
        })?;
        world.limits.insert(
            pin,
            LimitWiring {
                axis: index,
                side,
                trip_at,
            },
        );
        Ok(())
    }

    /// Pin an input to a fixed level (a stuck or forced sensor); `None`
    /// restores normal behaviour.
    pub fn force(&self, pin: PinId, level: Option<Level>) {
        let mut world = lock(&self.world);
        match level {
            Some(level) => world.forced.insert(pin, level),
            None => world.forced.remove(&pin),
        };
    }

    /// Declare two outputs as the A/B drive of one actuator. Writes that
    /// leave both high are counted in [`overlap_count`][Self::overlap_count].
    pub fn pair_outputs(&self, a: PinId, b: PinId) {
        lock(&self.world).pairs.push((a, b));
    }

    /// Teleport a carriage to `physical` without changing its counter offset.
    pub fn place(&self, axis: &str, physical: i64) {
        let mut world = lock(&self.world);
        if let Some(i) = world.axis_index(axis) {
            world.axes[i].physical = physical;
        }
    }

    pub fn physical_position(&self, axis: &str) -> Option<i64> {
        let world = lock(&self.world);
        world.axis_index(axis).map(|i| world.axes[i].physical)
    }

    /// Last `(max_speed, acceleration)` programmed into a carriage's driver.
    pub fn profile(&self, axis: &str) -> Option<(f32, f32)> {
        let world = lock(&self.world);
        world
            .axis_index(axis)
            .map(|i| (world.axes[i].max_speed, world.axes[i].acceleration))
    }

    pub fn io(&self) -> SimIo {
        SimIo {
            world: Arc::clone(&self.world),
            clock: self.clock.clone(),
        }
    }

    pub fn clock(&self) -> SimClock {
        self.clock.clone()
    }

    /// Every output write so far, in order.
    pub fn writes(&self) -> Vec<PinWrite> {
        lock(&self.world).writes.clone()
    }

    /// Last level driven on an output (low if never driven).
    pub fn output(&self, pin: PinId) -> Level {
        lock(&self.world)
            .outputs
            .get(&pin)
            .copied()
            .unwrap_or(Level::Low)
    }

    /// Number of writes that left both pins of a paired actuator high.
    pub fn overlap_count(&self) -> usize {
        lock(&self.world).overlaps
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub stepper
// ────────────────────────────────────────────────────────────────────────────

/// A simulated stepper that emits exactly one step per `run_speed` call.
pub struct SimStepper {
    id: String,
    world: Arc<Mutex<SimWorld>>,
    axis: usize,
    speed: f32,
    target: i64,
}

impl SimStepper {
    fn step(&mut self, direction: i64) {
        lock(&self.world).axes[self.axis].physical += direction;
    }
}

impl StepperDriver for SimStepper {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_max_speed(&mut self, steps_per_sec: f32) {
        lock(&self.world).axes[self.axis].max_speed = steps_per_sec;
    }

    fn set_acceleration(&mut self, steps_per_sec2: f32) {
        lock(&self.world).axes[self.axis].acceleration = steps_per_sec2;
    }

    fn move_to(&mut self, absolute: i64) {
        self.target = absolute;
    }

    fn set_speed(&mut self, steps_per_sec: f32) {
        self.speed = steps_per_sec;
    }

    fn speed(&self) -> f32 {
        self.speed
    }

    fn run_speed(&mut self) -> bool {
        if self.speed == 0.0 {
            return false;
        }
        self.step(if self.speed > 0.0 { 1 } else { -1 });
        true
    }

    fn run(&mut self) -> bool {
        let position = self.current_position();
        if position == self.target {
            return false;
        }
        self.step((self.target - position).signum());
        self.current_position() != self.target
    }

    fn current_position(&self) -> i64 {
        let world = lock(&self.world);
        let axis = &world.axes[self.axis];
        axis.physical - axis.offset
    }

    fn target_position(&self) -> i64 {
        self.target
    }

    fn set_current_position(&mut self, position: i64) {
        let mut world = lock(&self.world);
        let axis = &mut world.axes[self.axis];
        axis.offset = axis.physical - position;
        self.target = position;
    }

    fn stop(&mut self) {
        self.target = self.current_position();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Stub I/O
// ────────────────────────────────────────────────────────────────────────────

/// Simulated GPIO bank backed by the rig's world.
pub struct SimIo {
    world: Arc<Mutex<SimWorld>>,
    clock: SimClock,
}

impl DigitalIo for SimIo {
    fn read(&self, pin: PinId) -> Result<Level, RigError> {
        Ok(lock(&self.world).read(pin))
    }

    fn write(&mut self, pin: PinId, level: Level) -> Result<(), RigError> {
        let at_ms = self.clock.now_ms();
        let mut world = lock(&self.world);
        world.outputs.insert(pin, level);
        world.writes.push(PinWrite { pin, level, at_ms });

        let overlapping = world.pairs.iter().any(|&(a, b)| {
            (a == pin || b == pin)
                && world.outputs.get(&a) == Some(&Level::High)
                && world.outputs.get(&b) == Some(&Level::High)
        });
        if overlapping {
            warn!(pin, "both drive pins of an actuator are high");
            world.overlaps += 1;
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Virtual clock
// ────────────────────────────────────────────────────────────────────────────

/// A virtual clock: delays advance time instantly.
#[derive(Clone, Default)]
pub struct SimClock {
    now: Arc<AtomicU64>,
}

impl SimClock {
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn delay_ms(&self, ms: u64) {
        self.advance(ms);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_follow_physical_position_not_counter() {
        let rig = SimRig::new();
        let mut axis = rig.add_axis("top");
        rig.wire_limit(5, "top", LimitSide::Right, 10).unwrap();
        let io = rig.io();

        rig.place("top", 10);
        assert_eq!(io.read(5).unwrap(), Level::Low);

        // Zeroing the counter must not move the end stop.
        axis.set_current_position(0);
        assert_eq!(axis.current_position(), 0);
        assert_eq!(io.read(5).unwrap(), Level::Low);

        axis.set_speed(-1.0);
        axis.run_speed();
        assert_eq!(axis.current_position(), -1);
        assert_eq!(rig.physical_position("top"), Some(9));
        assert_eq!(io.read(5).unwrap(), Level::High);
    }

    #[test]
    fn profile_is_visible_through_the_rig() {
        let rig = SimRig::new();
        let mut axis = rig.add_axis("bottom");
        assert_eq!(rig.profile("bottom"), Some((1.0, 1.0)));
        axis.set_max_speed(250.0);
        axis.set_acceleration(500.0);
        assert_eq!(rig.profile("bottom"), Some((250.0, 500.0)));
        assert_eq!(rig.profile("top"), None);
    }

    #[test]
    fn left_limit_asserts_at_or_below_trip_point() {
        let rig = SimRig::new();
        let _axis = rig.add_axis("bottom");
        rig.wire_limit(2, "bottom", LimitSide::Left, -3).unwrap();
        let io = rig.io();
        rig.place("bottom", -2);
        assert_eq!(io.read(2).unwrap(), Level::High);
        rig.place("bottom", -3);
        assert_eq!(io.read(2).unwrap(), Level::Low);
    }

    #[test]
    fn forced_sensor_overrides_position() {
        let rig = SimRig::new();
        let _axis = rig.add_axis("bottom");
        rig.wire_limit(2, "bottom", LimitSide::Left, -100).unwrap();
        let io = rig.io();
        rig.force(2, Some(Level::Low));
        assert_eq!(io.read(2).unwrap(), Level::Low);
        rig.force(2, None);
        assert_eq!(io.read(2).unwrap(), Level::High);
    }

    #[test]
    fn wiring_unknown_axis_is_a_fault() {
        let rig = SimRig::new();
        assert!(matches!(
            rig.wire_limit(1, "ghost", LimitSide::Left, 0),
            Err(RigError::HardwareFault { .. })
        ));
    }

    #[test]
    fn paired_outputs_detect_overlap() {
        let rig = SimRig::new();
        rig.pair_outputs(6, 7);
        let mut io = rig.io();
        io.write(6, Level::High).unwrap();
        io.write(7, Level::Low).unwrap();
        assert_eq!(rig.overlap_count(), 0);
        io.write(7, Level::High).unwrap();
        assert_eq!(rig.overlap_count(), 1);
        assert_eq!(rig.writes().len(), 3);
    }

    #[test]
    fn run_steps_toward_target() {
        let rig = SimRig::new();
        let mut axis = rig.add_axis("jaw");
        axis.move_to(-3);
        let mut calls = 1;
        while axis.run() {
            calls += 1;
        }
        assert_eq!(calls, 3);
        assert_eq!(axis.current_position(), -3);
    }

    #[test]
    fn sim_clock_advances_on_delay() {
        let rig = SimRig::new();
        let clock = rig.clock();
        clock.delay_ms(2500);
        assert_eq!(rig.clock().now_ms(), 2500);
    }
}
