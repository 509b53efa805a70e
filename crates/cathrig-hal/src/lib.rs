//! `cathrig-hal` – Hardware Abstraction Layer
//!
//! The motion core never touches a pin or a step generator directly; it talks
//! to the traits in this crate so bench drivers, firmware bindings and the
//! simulator are interchangeable.
//!
//! # Modules
//!
//! - [`stepper`] – [`StepperDriver`][stepper::StepperDriver]: the
//!   step-generation capability of one motor (speed, target, single-tick
//!   advance, position integrator).
//! - [`io`] – [`DigitalIo`][io::DigitalIo]: limit-sensor reads and actuator
//!   pin writes.
//! - [`clock`] – [`Clock`][clock::Clock]: monotonic milliseconds and blocking
//!   delays.
//! - [`coordinated`] – [`CoordinatedMove`][coordinated::CoordinatedMove]:
//!   lockstep multi-axis stepping toward absolute targets.
//! - [`sim`] – [`SimRig`][sim::SimRig]: an in-process rig with simulated
//!   steppers, position-driven limit sensors and a virtual clock.

pub mod clock;
pub mod coordinated;
pub mod io;
pub mod sim;
pub mod stepper;

pub use clock::{Clock, SystemClock};
pub use coordinated::CoordinatedMove;
pub use io::{DigitalIo, Level, PinId};
pub use sim::{SimClock, SimIo, SimRig, SimStepper};
pub use stepper::StepperDriver;
