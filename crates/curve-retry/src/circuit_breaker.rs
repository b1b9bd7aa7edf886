//! Circuit breaker state machine guarding the outbox publisher's broker
//! calls (§3, §4.5, §5). A process-wide singleton per dispatcher instance;
//! all transitions happen under a single lock, so they're atomic.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls proceed normally.
    Closed,
    /// Calls are short-circuited until `open_duration` elapses.
    Open,
    /// One probe call is allowed through to test recovery.
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
}

/// Tracks consecutive broker-send failures and short-circuits further
/// attempts once a threshold is crossed, reopening after a cool-down via a
/// single half-open probe.
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    failure_threshold: u32,
    open_duration: Duration,
}

impl CircuitBreaker {
    /// Default failure threshold per §4.5 (5 consecutive failures).
    pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

    /// Construct a breaker with the default failure threshold.
    pub fn new(open_duration: Duration) -> Self {
        Self::with_failure_threshold(Self::DEFAULT_FAILURE_THRESHOLD, open_duration)
    }

    /// Construct a breaker with an explicit failure threshold.
    pub fn with_failure_threshold(failure_threshold: u32, open_duration: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner { state: CircuitState::Closed, consecutive_failures: 0, opened_at: None }),
            failure_threshold,
            open_duration,
        }
    }

    /// Evaluate whether a send attempt should proceed at `now`. Transitions
    /// OPEN to HALF_OPEN once the cool-down has elapsed, allowing exactly
    /// one probe through.
    pub fn allow(&self, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let opened_at = inner.opened_at.expect("OPEN state always carries opened_at");
                if now - opened_at >= self.open_duration {
                    inner.state = CircuitState::HalfOpen;
                    tracing::debug!("circuit breaker OPEN -> HALF_OPEN, allowing probe");
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Record a successful send: resets to CLOSED and clears the failure
    /// counter, regardless of prior state.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != CircuitState::Closed {
            tracing::debug!(from = ?inner.state, "circuit breaker -> CLOSED");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    /// Record a failed send at `now`. A CLOSED breaker opens once
    /// `consecutive_failures` reaches the threshold; a HALF_OPEN breaker
    /// whose probe failed reopens immediately.
    pub fn record_failure(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock().unwrap();
        inner.consecutive_failures += 1;

        match inner.state {
            CircuitState::Closed if inner.consecutive_failures >= self.failure_threshold => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                tracing::warn!(consecutive_failures = inner.consecutive_failures, "circuit breaker -> OPEN");
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                tracing::warn!("probe failed, circuit breaker -> OPEN");
            }
            _ => {}
        }
    }

    /// Current state, without mutating it.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Current consecutive-failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().unwrap().consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(Duration::seconds(60))
    }

    #[test]
    fn closed_breaker_allows_calls() {
        let b = breaker();
        assert_eq!(b.state(), CircuitState::Closed);
        assert!(b.allow(Utc::now()));
    }

    #[test]
    fn five_consecutive_failures_open_the_breaker() {
        let b = breaker();
        let now = Utc::now();
        for _ in 0..4 {
            b.record_failure(now);
            assert_eq!(b.state(), CircuitState::Closed);
        }
        b.record_failure(now);
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[test]
    fn open_breaker_blocks_until_duration_elapses() {
        let b = breaker();
        let opened_at = Utc::now();
        for _ in 0..5 {
            b.record_failure(opened_at);
        }
        assert_eq!(b.state(), CircuitState::Open);

        assert!(!b.allow(opened_at + Duration::seconds(30)));
        assert_eq!(b.state(), CircuitState::Open);

        assert!(b.allow(opened_at + Duration::seconds(61)));
        assert_eq!(b.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn success_in_half_open_closes_breaker() {
        let b = breaker();
        let opened_at = Utc::now();
        for _ in 0..5 {
            b.record_failure(opened_at);
        }
        assert!(b.allow(opened_at + Duration::seconds(61)));
        assert_eq!(b.state(), CircuitState::HalfOpen);

        b.record_success();
        assert_eq!(b.state(), CircuitState::Closed);
        assert_eq!(b.consecutive_failures(), 0);
    }

    #[test]
    fn failed_probe_in_half_open_reopens_breaker() {
        let b = breaker();
        let opened_at = Utc::now();
        for _ in 0..5 {
            b.record_failure(opened_at);
        }
        assert!(b.allow(opened_at + Duration::seconds(61)));
        assert_eq!(b.state(), CircuitState::HalfOpen);

        b.record_failure(opened_at + Duration::seconds(61));
        assert_eq!(b.state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_counter_in_closed_state() {
        let b = breaker();
        let now = Utc::now();
        b.record_failure(now);
        b.record_failure(now);
        assert_eq!(b.consecutive_failures(), 2);
        b.record_success();
        assert_eq!(b.consecutive_failures(), 0);
    }
}
