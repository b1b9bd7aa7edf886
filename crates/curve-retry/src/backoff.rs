//! Exponential backoff policy for Tier-1 retries (§4.5, §4.6).

use chrono::Duration;

/// Errors constructing an invalid [`RetryPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RetryPolicyError {
    /// `max_attempts` was zero.
    #[error("max_attempts must be at least 1")]
    ZeroMaxAttempts,
    /// `multiplier` was less than 1.0, which would shrink delays over time.
    #[error("multiplier must be >= 1.0")]
    InvalidMultiplier,
    /// `initial_interval` was zero or negative.
    #[error("initial_interval must be positive")]
    NonPositiveInterval,
}

/// `next_retry_at = initial_interval * multiplier^retry_count`, clamped to
/// `max_interval`. `retry_count + 1 >= max_attempts` marks the row FAILED
/// rather than retried again.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
}

impl RetryPolicy {
    /// Construct a policy, validating that attempts are possible and delays
    /// are non-degenerate.
    pub fn new(
        max_attempts: u32,
        initial_interval: Duration,
        multiplier: f64,
        max_interval: Duration,
    ) -> Result<Self, RetryPolicyError> {
        if max_attempts == 0 {
            return Err(RetryPolicyError::ZeroMaxAttempts);
        }
        if multiplier < 1.0 {
            return Err(RetryPolicyError::InvalidMultiplier);
        }
        if initial_interval <= Duration::zero() {
            return Err(RetryPolicyError::NonPositiveInterval);
        }
        Ok(Self { max_attempts, initial_interval, multiplier, max_interval })
    }

    /// Maximum number of attempts before a row is marked FAILED.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, given the number of attempts already
    /// made (zero-based), clamped to `max_interval`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let factor = self.multiplier.powi(retry_count as i32);
        let wanted_ms = self.initial_interval.num_milliseconds() as f64 * factor;
        let capped_ms = wanted_ms.min(self.max_interval.num_milliseconds() as f64);
        Duration::milliseconds(capped_ms as i64)
    }

    /// Whether a row with `retry_count` attempts already made should be
    /// marked FAILED rather than scheduled for another retry.
    pub fn should_fail(&self, retry_count: u32) -> bool {
        retry_count + 1 >= self.max_attempts
    }
}
