//! Publisher loop configuration and adaptive batch sizing (§4.5).

use std::time::Duration as StdDuration;

use chrono::Duration as ChronoDuration;
use curve_retry::RetryPolicy;

/// Configuration for a [`crate::Publisher`] instance.
#[derive(Clone)]
pub struct PublisherConfig {
    /// Sleep between poll iterations.
    pub poll_interval: StdDuration,
    /// Configured batch size, clamped to `[1, 1000]` at use.
    pub base_batch_size: usize,
    /// Whether batch size scales with backlog depth (§4.5 step 3).
    pub dynamic_batching: bool,
    /// Outbox-level retry policy governing `mark_retry` vs `mark_failed`.
    pub retry_policy: RetryPolicy,
    /// How long the circuit breaker stays OPEN before allowing a probe.
    pub circuit_open_duration: ChronoDuration,
    /// Interval between cleanup task runs.
    pub cleanup_interval: StdDuration,
    /// Age after which PUBLISHED rows are eligible for deletion.
    pub retention: ChronoDuration,
    /// How long shutdown waits for in-flight work before forcibly
    /// cancelling background tasks.
    pub shutdown_grace_period: StdDuration,
}

impl PublisherConfig {
    /// Batch size for this iteration given the current pending count.
    pub fn batch_size_for(&self, pending: u64) -> usize {
        let base = self.base_batch_size.clamp(1, 1000);
        if !self.dynamic_batching {
            return base;
        }

        if pending > 1000 {
            (base * 2).min(500)
        } else if pending > 500 {
            ((base as f64 * 1.5) as usize).min(300)
        } else if pending < 10 {
            base.min(10)
        } else {
            base
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: usize, dynamic: bool) -> PublisherConfig {
        PublisherConfig {
            poll_interval: StdDuration::from_secs(1),
            base_batch_size: base,
            dynamic_batching: dynamic,
            retry_policy: RetryPolicy::new(5, ChronoDuration::milliseconds(100), 2.0, ChronoDuration::seconds(10)).unwrap(),
            circuit_open_duration: ChronoDuration::seconds(60),
            cleanup_interval: StdDuration::from_secs(3600),
            retention: ChronoDuration::days(7),
            shutdown_grace_period: StdDuration::from_secs(30),
        }
    }

    #[test]
    fn static_batching_always_returns_base() {
        let cfg = config(50, false);
        assert_eq!(cfg.batch_size_for(5000), 50);
        assert_eq!(cfg.batch_size_for(1), 50);
    }

    #[test]
    fn large_backlog_doubles_up_to_cap() {
        let cfg = config(100, true);
        assert_eq!(cfg.batch_size_for(1001), 200);
        assert_eq!(cfg.batch_size_for(10_000), 200);
    }

    #[test]
    fn large_backlog_respects_the_500_cap() {
        let cfg = config(400, true);
        assert_eq!(cfg.batch_size_for(2000), 500);
    }

    #[test]
    fn moderate_backlog_scales_by_one_and_a_half() {
        let cfg = config(100, true);
        assert_eq!(cfg.batch_size_for(501), 150);
    }

    #[test]
    fn shallow_backlog_is_capped_at_ten() {
        let cfg = config(100, true);
        assert_eq!(cfg.batch_size_for(5), 10);
    }

    #[test]
    fn middling_backlog_uses_base() {
        let cfg = config(100, true);
        assert_eq!(cfg.batch_size_for(200), 100);
    }

    #[test]
    fn base_batch_size_is_clamped_to_1000() {
        let cfg = config(5000, false);
        assert_eq!(cfg.batch_size_for(200), 1000);
    }
}
