//! [`MotionGuard`] – bounded blocking loops.
//!
//! Every blocking loop in the motion core (constant-speed moves, the homing
//! seek, coordinated moves) opens a [`TickBudget`], calls
//! [`TickBudget::tick`] before each poll of its drivers and reports emitted
//! steps with [`TickBudget::stepped`]. Cancellation is checked on every
//! poll; the ceiling counts steps only, so a driver that paces its pulses
//! (returning `false` from most polls) is not cut short. A stuck sensor
//! surfaces as a [`RigError`] instead of a hung controller.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cathrig_types::RigError;
use tracing::warn;

/// Cancellation token plus a per-primitive step ceiling.
///
/// Clones share the same token.
///
/// # Example
///
/// ```
/// use cathrig_kernel::guard::MotionGuard;
///
/// let guard = MotionGuard::new(2);
/// let mut budget = guard.budget("jog");
/// assert!(budget.tick().is_ok());
/// budget.stepped(false);
/// assert!(budget.tick().is_ok());
/// budget.stepped(true);
/// assert!(budget.tick().is_ok());
/// budget.stepped(true);
/// assert!(budget.tick().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct MotionGuard {
    cancel: Arc<AtomicBool>,
    max_ticks: u64,
}

impl MotionGuard {
    pub fn new(max_ticks: u64) -> Self {
        Self::with_token(max_ticks, Arc::new(AtomicBool::new(false)))
    }

    /// Build a guard around an existing token, e.g. one flipped by a Ctrl-C
    /// handler.
    pub fn with_token(max_ticks: u64, cancel: Arc<AtomicBool>) -> Self {
        Self { cancel, max_ticks }
    }

    pub fn token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Clear a previous cancellation so the next command may run.
    pub fn reset(&self) {
        self.cancel.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Open a fresh budget for one blocking primitive.
    pub fn budget(&self, operation: &'static str) -> TickBudget<'_> {
        TickBudget {
            guard: self,
            operation,
            steps: 0,
        }
    }
}

/// Step counter for one blocking loop.
pub struct TickBudget<'a> {
    guard: &'a MotionGuard,
    operation: &'static str,
    steps: u64,
}

impl TickBudget<'_> {
    /// Gate the next poll of the drivers.
    ///
    /// # Errors
    ///
    /// [`RigError::Cancelled`] once the token is set, [`RigError::Timeout`]
    /// once the loop has emitted as many steps as the guard allows.
    pub fn tick(&mut self) -> Result<(), RigError> {
        if self.guard.is_cancelled() {
            warn!(operation = self.operation, steps = self.steps, "motion cancelled");
            return Err(RigError::Cancelled {
                operation: self.operation.to_string(),
            });
        }
        if self.steps >= self.guard.max_ticks {
            warn!(operation = self.operation, ticks = self.guard.max_ticks, "step budget exhausted");
            return Err(RigError::Timeout {
                operation: self.operation.to_string(),
                ticks: self.guard.max_ticks,
            });
        }
        Ok(())
    }

    /// Charge the poll that just ran if it emitted a step.
    pub fn stepped(&mut self, emitted: bool) {
        if emitted {
            self.steps += 1;
        }
    }
}
