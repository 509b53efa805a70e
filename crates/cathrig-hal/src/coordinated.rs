//! [`CoordinatedMove`] – lockstep multi-axis stepping.
//!
//! The axis with the longest travel (the *lead*) advances once per
//! [`run`][CoordinatedMove::run] tick; every other axis is stepped whenever
//! its proportional share of the lead's progress, rounded to the nearest
//! step, gets ahead of the steps it has already taken. All axes therefore
//! arrive on the same tick and hold their distance ratio throughout.
//!
//! The planner does not own the drivers. Each call borrows them afresh, so
//! the caller is free to poll limit sensors on the same axes between ticks.

use crate::stepper::StepperDriver;

/// Coordinated move of several drivers toward absolute targets.
#[derive(Debug, Clone, Default)]
pub struct CoordinatedMove {
    origins: Vec<i64>,
    targets: Vec<i64>,
    spans: Vec<i64>,
    lead_span: i64,
    tick: i64,
}

impl CoordinatedMove {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plan a move of `drivers[i]` to `targets[i]`.
    ///
    /// Each driver's constant speed is scaled so that the lead axis runs at
    /// `max_speed`. Extra drivers or targets beyond the shorter slice are
    /// ignored.
    pub fn move_to(
        &mut self,
        drivers: &mut [&mut dyn StepperDriver],
        targets: &[i64],
        max_speed: f32,
    ) {
        debug_assert_eq!(drivers.len(), targets.len());
        self.origins.clear();
        self.targets.clear();
        self.spans.clear();
        self.tick = 0;

        for (driver, &target) in drivers.iter().zip(targets) {
            let origin = driver.current_position();
            self.origins.push(origin);
            self.targets.push(target);
            self.spans.push((target - origin).abs());
        }
        self.lead_span = self.spans.iter().copied().max().unwrap_or(0);

        for (i, driver) in drivers.iter_mut().enumerate().take(self.targets.len()) {
            driver.move_to(self.targets[i]);
            let speed = if self.lead_span == 0 {
                0.0
            } else {
                max_speed.abs() * self.spans[i] as f32 / self.lead_span as f32
            };
            let direction = (self.targets[i] - self.origins[i]).signum() as f32;
            driver.set_speed(speed * direction);
        }
    }

    /// Advance one tick. Returns `true` if any axis still had distance to go
    /// when the tick started.
    pub fn run(&mut self, drivers: &mut [&mut dyn StepperDriver]) -> bool {
        if self.lead_span == 0 {
            return false;
        }
        if self.tick < self.lead_span {
            self.tick += 1;
        }

        let mut running = false;
        for (i, driver) in drivers.iter_mut().enumerate().take(self.targets.len()) {
            let position = driver.current_position();
            if position == self.targets[i] {
                continue;
            }
            running = true;
            let due = (self.tick * self.spans[i] + self.lead_span / 2) / self.lead_span;
            let done = (position - self.origins[i]).abs();
            if due > done {
                driver.run_speed();
            }
        }
        running
    }

    /// Steps left on the lead axis's schedule.
    pub fn ticks_remaining(&self) -> i64 {
        self.lead_span - self.tick
    }
}
