//! Generic `StepperDriver` trait for step/direction motor drivers.
//!
//! The trait mirrors the surface of a commodity acceleration-stepper library:
//! the driver owns pulse timing and the position integrator, the caller owns
//! the control loop.

/// Step generation for one physical motor.
///
/// Positions are signed step counts; positive travel is toward the right
/// limit sensor.
pub trait StepperDriver: Send {
    /// Stable identifier for this driver, e.g. `"bottom_transport"`.
    fn id(&self) -> &str;

    /// Upper bound on speed for profiled moves, in steps/s.
    fn set_max_speed(&mut self, steps_per_sec: f32);

    /// Acceleration for profiled moves, in steps/s².
    fn set_acceleration(&mut self, steps_per_sec2: f32);

    /// Set an absolute target position without moving.
    fn move_to(&mut self, absolute: i64);

    /// Set the signed constant speed used by [`run_speed`][Self::run_speed].
    fn set_speed(&mut self, steps_per_sec: f32);

    fn speed(&self) -> f32;

    /// Advance one scheduling tick at the constant speed, in the direction of
    /// its sign. The target is not consulted. Returns `true` if a step was
    /// emitted.
    ///
    /// A driver that emits exactly one step per call keeps
    /// [`CoordinatedMove`][crate::CoordinatedMove] in exact ratio.
    fn run_speed(&mut self) -> bool;

    /// Advance one tick of a profiled move toward the target. Returns `true`
    /// while the target has not been reached.
    fn run(&mut self) -> bool;

    fn current_position(&self) -> i64;

    fn target_position(&self) -> i64;

    /// Redefine the current position (used for zeroing). Also resets the
    /// target to `position`.
    fn set_current_position(&mut self, position: i64);

    /// Stop as quickly as the profile allows.
    fn stop(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process driver used only for tests.
    struct MockStepper {
        position: i64,
        target: i64,
        speed: f32,
    }

    impl StepperDriver for MockStepper {
        fn id(&self) -> &str {
            "mock"
        }
        fn set_max_speed(&mut self, _steps_per_sec: f32) {}
        fn set_acceleration(&mut self, _steps_per_sec2: f32) {}
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
            self.position += if self.speed > 0.0 { 1 } else { -1 };
            true
        }
        fn run(&mut self) -> bool {
            if self.position == self.target {
                return false;
            }
            self.position += (self.target - self.position).signum();
            self.position != self.target
        }
        fn current_position(&self) -> i64 {
            self.position
        }
        fn target_position(&self) -> i64 {
            self.target
        }
        fn set_current_position(&mut self, position: i64) {
            self.position = position;
            self.target = position;
        }
        fn stop(&mut self) {
            self.target = self.position;
        }
    }

    #[test]
    fn run_speed_ignores_target() {
        let mut s = MockStepper {
            position: 0,
            target: 0,
            speed: -10.0,
        };
        assert!(s.run_speed());
        assert!(s.run_speed());
        assert_eq!(s.current_position(), -2);
        assert_eq!(s.target_position(), 0);
    }

    #[test]
    fn zeroing_resets_target() {
        let mut s = MockStepper {
            position: 40,
            target: 90,
            speed: 0.0,
        };
        s.set_current_position(0);
        assert_eq!(s.current_position(), 0);
        assert_eq!(s.target_position(), 0);
        assert!(!s.run());
    }
}
