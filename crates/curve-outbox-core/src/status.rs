//! Outbox row status and its transition DAG (§3).

use serde::{Deserialize, Serialize};

/// Lifecycle state of a persisted outbox row.
///
/// Transitions form a DAG: `PENDING -> IN_FLIGHT -> {PENDING, PUBLISHED,
/// FAILED}`. `PUBLISHED` and `FAILED` are terminal for the normal flow;
/// `FAILED -> PENDING` is permitted only as an external-operator reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutboxStatus {
    /// Eligible for lease once `next_retry_at <= now`.
    Pending,
    /// Leased by exactly one publisher; not eligible for re-lease.
    InFlight,
    /// Delivered to the broker successfully. Terminal.
    Published,
    /// Exhausted its retry budget. Terminal, except for an operator reset.
    Failed,
}

impl OutboxStatus {
    /// Whether transitioning from `self` to `next` is a legal move in the
    /// status DAG.
    pub fn can_transition_to(self, next: OutboxStatus) -> bool {
        use OutboxStatus::*;
        matches!(
            (self, next),
            (Pending, InFlight) | (InFlight, Pending) | (InFlight, Published) | (InFlight, Failed) | (Failed, Pending)
        )
    }
}
