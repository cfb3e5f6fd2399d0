//! # Clock Abstraction
//!
//! Time source injected into the executor and pointer factory so retry
//! sleeps, lock expirations, and event TTLs can be driven by a simulated
//! clock in tests.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::RwLock;
use std::time::Duration;

/// Time source for all executor time arithmetic
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current UTC time
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock time source used in production
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually-advanced time source for deterministic tests
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at the given instant
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, by: Duration) {
        let delta = ChronoDuration::from_std(by).expect("duration out of range");
        let mut now = self.now.write();
        *now += delta;
    }

    /// Move the clock to an absolute instant
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.write() = to;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::default();
        let start = clock.now_utc();

        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now_utc() - start, ChronoDuration::seconds(5));

        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now_utc() - start, ChronoDuration::milliseconds(5500));
    }

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now_utc();
        let b = clock.now_utc();
        assert!(b >= a);
    }
}
