//! # Retry Backoff Calculator
//!
//! Exponential backoff with a hard cap, computed from a step's retry policy.
//! A result-supplied interval (a `Delay` step, or a body that knows its
//! downstream's retry-after) always wins over the computed schedule.

use std::time::Duration;

use crate::models::RetryPolicy;

#[derive(Debug, Default, Clone, Copy)]
pub struct BackoffCalculator;

impl BackoffCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Delay before retry number `retry_count + 1`.
    ///
    /// `base * multiplier^retry_count`, saturating at the policy cap.
    pub fn delay_for(&self, policy: &RetryPolicy, retry_count: u32) -> Duration {
        let base = policy.base_delay.as_secs_f64();
        let factor = policy.backoff_multiplier.max(1.0).powi(retry_count as i32);
        let raw = base * factor;
        let capped = raw.min(policy.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Interval actually applied: the explicit request else the schedule
    pub fn resolve(
        &self,
        policy: &RetryPolicy,
        retry_count: u32,
        requested: Option<Duration>,
    ) -> Duration {
        requested.unwrap_or_else(|| self.delay_for(policy, retry_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }

    #[test]
    fn test_exponential_growth() {
        let calculator = BackoffCalculator::new();
        let policy = policy();

        assert_eq!(calculator.delay_for(&policy, 0), Duration::from_secs(1));
        assert_eq!(calculator.delay_for(&policy, 1), Duration::from_secs(2));
        assert_eq!(calculator.delay_for(&policy, 2), Duration::from_secs(4));
        assert_eq!(calculator.delay_for(&policy, 3), Duration::from_secs(8));
    }

    #[test]
    fn test_cap_applies() {
        let calculator = BackoffCalculator::new();
        let policy = policy();

        assert_eq!(calculator.delay_for(&policy, 10), Duration::from_secs(30));
    }

    #[test]
    fn test_requested_interval_wins() {
        let calculator = BackoffCalculator::new();
        let policy = policy();

        assert_eq!(
            calculator.resolve(&policy, 3, Some(Duration::from_millis(250))),
            Duration::from_millis(250)
        );
        assert_eq!(
            calculator.resolve(&policy, 3, None),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn test_sub_unit_multiplier_never_shrinks() {
        let calculator = BackoffCalculator::new();
        let policy = RetryPolicy {
            backoff_multiplier: 0.5,
            ..policy()
        };

        assert_eq!(calculator.delay_for(&policy, 4), Duration::from_secs(1));
    }
}
