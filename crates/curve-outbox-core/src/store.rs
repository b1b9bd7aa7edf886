//! The `OutboxStore` contract (§4.4).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::OutboxError;
use crate::record::OutboxRecord;

/// Durable backing store for the transactional outbox.
///
/// Implementations must uphold the invariant *at-most-one publisher
/// attempt in flight per row*: `lease_batch` transitions each returned row
/// to `IN_FLIGHT` within the same short transaction that selected it, so
/// the row-level lock (however the dialect expresses it — `SELECT ... FOR
/// UPDATE SKIP LOCKED`, or application-level advisory locking where that's
/// unavailable) is released only once `IN_FLIGHT` is durably visible to
/// other instances.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Persist a newly assembled row. Intended to run inside the caller's
    /// own business transaction for SQL-backed drivers; drivers without a
    /// transaction concept (in-memory) simply apply it immediately.
    async fn save(&self, record: OutboxRecord) -> Result<(), OutboxError>;

    /// Select up to `limit` rows eligible for lease at `now`
    /// (`status = PENDING`, `next_retry_at <= now`), transitioning them to
    /// `IN_FLIGHT` atomically with the selection.
    async fn lease_batch(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<OutboxRecord>, OutboxError>;

    /// Mark rows as durably published, stamping `published_at`.
    async fn mark_published(&self, ids: &[u64], published_at: DateTime<Utc>) -> Result<(), OutboxError>;

    /// Schedule a row for another attempt, recording the failure and
    /// incrementing `retry_count`.
    async fn mark_retry(&self, id: u64, next_retry_at: DateTime<Utc>, error: &str) -> Result<(), OutboxError>;

    /// Mark a row permanently failed, recording the final error.
    async fn mark_failed(&self, id: u64, error: &str) -> Result<(), OutboxError>;

    /// Delete `PUBLISHED` rows older than `cutoff`, in bounded batches;
    /// returns the number of rows deleted.
    async fn delete_published_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, OutboxError>;

    /// Number of rows currently `PENDING`. Drivers are expected to serve
    /// this from a short-TTL cache (see [`crate::PendingCountCache`]);
    /// callers tolerate staleness.
    async fn count_pending(&self, now: DateTime<Utc>) -> Result<u64, OutboxError>;
}
