//! Pending-count cache (§4.4): a single TTL-guarded value, refreshed lazily
//! by the store implementation. Callers tolerate staleness.

use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

struct Inner {
    count: u64,
    cached_at: DateTime<Utc>,
}

/// Single atomic cached value with a TTL guard, shared by every
/// [`crate::OutboxStore`] driver so `count_pending` doesn't hit the backing
/// store on every call.
pub struct PendingCountCache {
    inner: Mutex<Option<Inner>>,
    ttl: Duration,
}

impl PendingCountCache {
    /// Construct an empty cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self { inner: Mutex::new(None), ttl }
    }

    /// Return the cached count if it's still fresh at `now`.
    pub fn get(&self, now: DateTime<Utc>) -> Option<u64> {
        let inner = self.inner.lock().unwrap();
        inner.as_ref().filter(|entry| now - entry.cached_at < self.ttl).map(|entry| entry.count)
    }

    /// Refresh the cached value.
    pub fn set(&self, count: u64, now: DateTime<Utc>) {
        *self.inner.lock().unwrap() = Some(Inner { count, cached_at: now });
    }
}
