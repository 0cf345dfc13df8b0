//! Retry policy and per-attempt records.
//!
//! The policy computes a strictly exponential delay bound; the coordinator
//! draws a jittered value below that bound only when the policy asks for it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Controls how many times an operation may be attempted and how long to
/// wait between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first attempt. Always >= 1.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    /// Draw each delay uniformly from [0, bound] instead of using the
    /// bound itself.
    pub jitter: bool,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            backoff_multiplier,
            jitter: false,
        }
    }

    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Delay bound before the attempt that follows `completed_failures`
    /// failures: `initial_delay * multiplier^completed_failures`, saturating
    /// rather than overflowing for large exponents.
    pub fn delay_for(&self, completed_failures: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(completed_failures as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        if millis.is_finite() && millis >= 0.0 {
            Duration::from_millis(millis.min(u64::MAX as f64) as u64)
        } else {
            Duration::MAX
        }
    }

    /// Whether another attempt is allowed after `completed_attempts`.
    pub fn allows_another(&self, completed_attempts: u32) -> bool {
        completed_attempts < self.max_attempts
    }

    /// Sum of delay bounds slept before a success on attempt `k + 1`
    /// (after exactly `k` failures).
    pub fn total_delay_before_success(&self, failures: u32) -> Duration {
        (0..failures).map(|k| self.delay_for(k)).sum()
    }
}

impl Default for RetryPolicy {
    /// Default: 3 attempts, 1s initial delay, doubling, no jitter.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1), 2.0)
    }
}

/// Outcome of a single attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttemptOutcome {
    Success,
    Failure,
}

/// One attempt made by the retry coordinator. Ephemeral, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
    pub at: chrono::DateTime<chrono::Utc>,
}

impl AttemptRecord {
    pub fn success(attempt: u32) -> Self {
        Self {
            attempt,
            outcome: AttemptOutcome::Success,
            error: None,
            at: chrono::Utc::now(),
        }
    }

    pub fn failure(attempt: u32, error: impl Into<String>) -> Self {
        Self {
            attempt,
            outcome: AttemptOutcome::Failure,
            error: Some(error.into()),
            at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.initial_delay, Duration::from_secs(1));
        assert!(!p.jitter);
    }

    #[test]
    fn attempt_budget() {
        let p = RetryPolicy::new(3, Duration::from_millis(100), 2.0);
        assert!(p.allows_another(0));
        assert!(p.allows_another(2));
        assert!(!p.allows_another(3));
        assert!(!p.allows_another(4));
    }

    #[test]
    fn zero_attempts_clamped_to_one() {
        let p = RetryPolicy::new(0, Duration::from_millis(100), 2.0);
        assert_eq!(p.max_attempts, 1);
    }

    #[test]
    fn exponential_delays() {
        let p = RetryPolicy::new(5, Duration::from_secs(1), 2.0);
        assert_eq!(p.delay_for(0), Duration::from_secs(1));
        assert_eq!(p.delay_for(1), Duration::from_secs(2));
        assert_eq!(p.delay_for(2), Duration::from_secs(4));
        assert_eq!(p.delay_for(3), Duration::from_secs(8));
    }

    #[test]
    fn fractional_multiplier() {
        let p = RetryPolicy::new(4, Duration::from_millis(1000), 1.5);
        assert_eq!(p.delay_for(0), Duration::from_millis(1000));
        assert_eq!(p.delay_for(1), Duration::from_millis(1500));
        assert_eq!(p.delay_for(2), Duration::from_millis(2250));
    }

    #[test]
    fn delay_sum_before_success() {
        // 30s initial, doubling, failures on attempts 1-3, success on 4:
        // slept 30 + 60 + 120 = 210s in total.
        let p = RetryPolicy::new(5, Duration::from_secs(30), 2.0);
        assert_eq!(p.total_delay_before_success(3), Duration::from_secs(210));
        // Immediate success sleeps nothing.
        assert_eq!(p.total_delay_before_success(0), Duration::ZERO);
    }

    #[test]
    fn large_exponent_saturates() {
        let p = RetryPolicy::new(u32::MAX, Duration::from_secs(60), 10.0);
        // Must not panic or wrap; anything this large is effectively capped.
        let d = p.delay_for(500);
        assert!(d > Duration::from_secs(u32::MAX as u64));
    }

    #[test]
    fn attempt_records() {
        let ok = AttemptRecord::success(1);
        assert_eq!(ok.outcome, AttemptOutcome::Success);
        assert!(ok.error.is_none());

        let failed = AttemptRecord::failure(2, "connection reset");
        assert_eq!(failed.attempt, 2);
        assert_eq!(failed.error.as_deref(), Some("connection reset"));
    }
}
