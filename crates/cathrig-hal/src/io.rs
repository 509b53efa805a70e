//! Digital I/O for limit sensors and clamp-actuator drive pins.

use cathrig_types::RigError;

/// Board pin number.
pub type PinId = u8;

/// Electrical level of a digital pin.
///
/// Limit sensors on the rig are active-low: [`Level::Low`] means the
/// carriage has reached that end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    fn from(active: bool) -> Self {
        if active { Level::High } else { Level::Low }
    }
}

/// Read and write access to the board's GPIO.
pub trait DigitalIo: Send {
    /// Sample the level of an input pin.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::HardwareFault`] if the pin cannot be read.
    fn read(&self, pin: PinId) -> Result<Level, RigError>;

    /// Drive an output pin.
    ///
    /// # Errors
    ///
    /// Returns [`RigError::HardwareFault`] if the pin cannot be driven.
    fn write(&mut self, pin: PinId, level: Level) -> Result<(), RigError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MockIo {
        pins: HashMap<PinId, Level>,
    }

    impl DigitalIo for MockIo {
        fn read(&self, pin: PinId) -> Result<Level, RigError> {
            self.pins
                .get(&pin)
                .copied()
                .ok_or_else(|| RigError::HardwareFault {
                    component: format!("pin {pin}"),
                    details: "not configured".to_string(),
                })
        }

        fn write(&mut self, pin: PinId, level: Level) -> Result<(), RigError> {
            self.pins.insert(pin, level);
            Ok(())
        }
    }

    #[test]
    fn level_from_bool() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert!(Level::High.is_high());
    }

    #[test]
    fn unknown_pin_is_a_hardware_fault() {
        let mut io = MockIo {
            pins: HashMap::new(),
        };
        assert!(matches!(io.read(3), Err(RigError::HardwareFault { .. })));
        io.write(3, Level::High).unwrap();
        assert_eq!(io.read(3).unwrap(), Level::High);
    }
}
