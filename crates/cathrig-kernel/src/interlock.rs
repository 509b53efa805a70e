//! [`GripInterlock`] – the "at most one released" rule.
//!
//! The catheter and guidewire are each held by a binary linear actuator.
//! Whatever the hand-off choreography, at least one of them must be clamped
//! at every instant or the inserted device can slip. The interlock is
//! consulted *before* an actuator is driven; a release that would leave both
//! ungripped is rejected with [`RigError::GripViolation`] and never reaches
//! the pins.

use cathrig_types::{Device, GripState, RigError};

/// Tracked grip state of both devices.
///
/// Both devices start clamped.
///
/// # Example
///
/// ```
/// use cathrig_kernel::interlock::GripInterlock;
/// use cathrig_types::{Device, GripState};
///
/// let mut lock = GripInterlock::new();
/// assert!(lock.check(Device::Catheter, GripState::Released).is_ok());
/// lock.commit(Device::Catheter, GripState::Released);
///
/// // The guidewire is now the only grip left.
/// assert!(lock.check(Device::Guidewire, GripState::Released).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GripInterlock {
    catheter: GripState,
    guidewire: GripState,
}

impl Default for GripInterlock {
    fn default() -> Self {
        Self {
            catheter: GripState::Clamped,
            guidewire: GripState::Clamped,
        }
    }
}

impl GripInterlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, device: Device) -> GripState {
        match device {
            Device::Catheter => self.catheter,
            Device::Guidewire => self.guidewire,
        }
    }

    /// Validate a transition of `device` to `target` without applying it.
    ///
    /// Clamping is always allowed. Releasing is allowed only while the other
    /// device is clamped.
    pub fn check(&self, device: Device, target: GripState) -> Result<(), RigError> {
        if target == GripState::Released && self.state(device.other()) == GripState::Released {
            return Err(RigError::GripViolation {
                releasing: device,
                held: device.other(),
            });
        }
        Ok(())
    }

    /// Record that `device` has been driven to `state`.
    pub fn commit(&mut self, device: Device, state: GripState) {
        match device {
            Device::Catheter => self.catheter = state,
            Device::Guidewire => self.guidewire = state,
        }
    }

    pub fn released_count(&self) -> usize {
        [self.catheter, self.guidewire]
            .iter()
            .filter(|s| **s == GripState::Released)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_fully_clamped() {
        let lock = GripInterlock::new();
        assert_eq!(lock.state(Device::Catheter), GripState::Clamped);
        assert_eq!(lock.state(Device::Guidewire), GripState::Clamped);
        assert_eq!(lock.released_count(), 0);
    }

    #[test]
    fn release_refused_while_other_released() {
        let mut lock = GripInterlock::new();
        lock.commit(Device::Guidewire, GripState::Released);
        let err = lock
            .check(Device::Catheter, GripState::Released)
            .unwrap_err();
        assert_eq!(
            err,
            RigError::GripViolation {
                releasing: Device::Catheter,
                held: Device::Guidewire,
            }
        );
    }

    #[test]
    fn clamping_always_allowed() {
        let mut lock = GripInterlock::new();
        lock.commit(Device::Guidewire, GripState::Released);
        assert!(lock.check(Device::Catheter, GripState::Clamped).is_ok());
        assert!(lock.check(Device::Guidewire, GripState::Clamped).is_ok());
    }

    #[test]
    fn re_releasing_same_device_is_allowed() {
        let mut lock = GripInterlock::new();
        lock.commit(Device::Catheter, GripState::Released);
        assert!(lock.check(Device::Catheter, GripState::Released).is_ok());
        assert_eq!(lock.released_count(), 1);
    }
}
