//! Monotonic time source for dwell timing and diagnostics.

use std::time::{Duration, Instant};

/// Millisecond clock with a blocking delay.
pub trait Clock: Send + Sync {
    /// Milliseconds since a clock-specific reference point.
    fn now_ms(&self) -> u64;

    /// Block the calling thread for `ms` milliseconds.
    fn delay_ms(&self, ms: u64);
}

/// Wall-clock [`Clock`] backed by [`Instant`] and [`std::thread::sleep`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    created_at: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            created_at: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.created_at.elapsed().as_millis() as u64
    }

    fn delay_ms(&self, ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_is_monotonic_across_delay() {
        let clock = SystemClock::new();
        let before = clock.now_ms();
        clock.delay_ms(5);
        assert!(clock.now_ms() >= before + 5);
    }
}
