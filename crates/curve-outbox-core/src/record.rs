//! Persisted outbox row (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::status::OutboxStatus;

/// A durable outbox row, staged inside the caller's business transaction
/// and later leased, published, and either retried or failed by the
/// publisher loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Primary key, shares its id space with the event's Snowflake id.
    pub id: u64,
    /// Type of the owning aggregate, used as partition key material.
    pub aggregate_type: String,
    /// Identifier of the owning aggregate instance.
    pub aggregate_id: String,
    /// Domain event type.
    pub event_type: String,
    /// Serialized envelope payload.
    pub payload_bytes: Vec<u8>,
    /// Serialized envelope metadata.
    pub metadata_bytes: Vec<u8>,
    /// Current lifecycle state.
    pub status: OutboxStatus,
    /// Number of publish attempts made so far.
    pub retry_count: u32,
    /// Message of the most recent failure, if any.
    pub last_error: Option<String>,
    /// When the row was first saved.
    pub created_at: DateTime<Utc>,
    /// Earliest time the row is eligible for lease.
    pub next_retry_at: DateTime<Utc>,
    /// When the row was successfully published, if it has been.
    pub published_at: Option<DateTime<Utc>>,
}

impl OutboxRecord {
    /// Construct a freshly saved row: `status = PENDING`, `retry_count = 0`,
    /// immediately eligible for lease (`next_retry_at = created_at`).
    pub fn new(
        id: u64,
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        payload_bytes: Vec<u8>,
        metadata_bytes: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            payload_bytes,
            metadata_bytes,
            status: OutboxStatus::Pending,
            retry_count: 0,
            last_error: None,
            created_at,
            next_retry_at: created_at,
            published_at: None,
        }
    }

    /// Whether this row is eligible for lease at `now`.
    pub fn is_eligible_for_lease(&self, now: DateTime<Utc>) -> bool {
        self.status == OutboxStatus::Pending && self.next_retry_at <= now
    }
}
