#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **curve-outbox-memory** – In-memory, non-persistent
//! [`curve_outbox_core::OutboxStore`] implementation, for tests and demos.
//! All data is lost when the process terminates; lease semantics are
//! emulated with a single write-locked critical section rather than
//! `SELECT ... FOR UPDATE SKIP LOCKED`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use curve_outbox_core::{OutboxError, OutboxRecord, OutboxStatus, OutboxStore, PendingCountCache};
use tokio::sync::RwLock;

/// In-memory outbox store backed by a single `HashMap` guarded by an async
/// read-write lock.
#[derive(Clone)]
pub struct MemoryOutboxStore {
    rows: Arc<RwLock<HashMap<u64, OutboxRecord>>>,
    pending_count_cache: Arc<PendingCountCache>,
}

impl Default for MemoryOutboxStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOutboxStore {
    /// Construct an empty store with the standard 5-second pending-count
    /// cache TTL (§4.4).
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
            pending_count_cache: Arc::new(PendingCountCache::new(Duration::seconds(5))),
        }
    }

    /// Number of rows currently stored, of any status. Test/demo helper.
    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Whether the store holds no rows. Test/demo helper.
    pub async fn is_empty(&self) -> bool {
        self.rows.read().await.is_empty()
    }
}

#[async_trait]
impl OutboxStore for MemoryOutboxStore {
    async fn save(&self, record: OutboxRecord) -> Result<(), OutboxError> {
        self.rows.write().await.insert(record.id, record);
        Ok(())
    }

    async fn lease_batch(&self, limit: usize, now: DateTime<Utc>) -> Result<Vec<OutboxRecord>, OutboxError> {
        let mut rows = self.rows.write().await;
        let mut leased = Vec::with_capacity(limit);

        let eligible_ids: Vec<u64> = rows
            .values()
            .filter(|r| r.is_eligible_for_lease(now))
            .take(limit)
            .map(|r| r.id)
            .collect();

        for id in eligible_ids {
            if let Some(row) = rows.get_mut(&id) {
                row.status = OutboxStatus::InFlight;
                leased.push(row.clone());
            }
        }

        Ok(leased)
    }

    async fn mark_published(&self, ids: &[u64], published_at: DateTime<Utc>) -> Result<(), OutboxError> {
        let mut rows = self.rows.write().await;
        for id in ids {
            let row = rows.get_mut(id).ok_or(OutboxError::NotFound(*id))?;
            if !row.status.can_transition_to(OutboxStatus::Published) {
                return Err(OutboxError::IllegalTransition { id: *id });
            }
            row.status = OutboxStatus::Published;
            row.published_at = Some(published_at);
        }
        Ok(())
    }

    async fn mark_retry(&self, id: u64, next_retry_at: DateTime<Utc>, error: &str) -> Result<(), OutboxError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&id).ok_or(OutboxError::NotFound(id))?;
        if !row.status.can_transition_to(OutboxStatus::Pending) {
            return Err(OutboxError::IllegalTransition { id });
        }
        row.status = OutboxStatus::Pending;
        row.retry_count += 1;
        row.next_retry_at = next_retry_at;
        row.last_error = Some(error.to_string());
        Ok(())
    }

    async fn mark_failed(&self, id: u64, error: &str) -> Result<(), OutboxError> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(&id).ok_or(OutboxError::NotFound(id))?;
        if !row.status.can_transition_to(OutboxStatus::Failed) {
            return Err(OutboxError::IllegalTransition { id });
        }
        row.status = OutboxStatus::Failed;
        row.last_error = Some(error.to_string());
        Ok(())
    }

    async fn delete_published_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, OutboxError> {
        let mut rows = self.rows.write().await;
        let to_delete: Vec<u64> = rows
            .values()
            .filter(|r| r.status == OutboxStatus::Published && r.published_at.map(|p| p < cutoff).unwrap_or(false))
            .map(|r| r.id)
            .collect();

        for id in &to_delete {
            rows.remove(id);
        }
        Ok(to_delete.len() as u64)
    }

    async fn count_pending(&self, now: DateTime<Utc>) -> Result<u64, OutboxError> {
        if let Some(cached) = self.pending_count_cache.get(now) {
            return Ok(cached);
        }
        let count = self.rows.read().await.values().filter(|r| r.status == OutboxStatus::Pending).count() as u64;
        self.pending_count_cache.set(count, now);
        Ok(count)
    }
}
