//! DLQ and backup-file record shape (§3), shared between the dispatcher
//! (which writes them) and the operator recovery tooling (which reads them
//! back) without either depending on the other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Independent record written to the DLQ topic, or to a backup file when the
/// DLQ send itself fails. Carries enough of the original send to support
/// manual or tooled re-publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlqRecord {
    /// Snowflake id of the original event.
    pub event_id: u64,
    /// Topic the original send targeted.
    pub original_topic: String,
    /// Serialized bytes of the original envelope, as they would have been
    /// written to the main topic.
    pub original_payload: Vec<u8>,
    /// Type name of the failure that triggered this record.
    pub exception_type: String,
    /// Human-readable failure message.
    pub exception_message: String,
    /// Epoch-millisecond timestamp of the failure.
    pub failed_at_epoch_ms: i64,
}

impl DlqRecord {
    /// Construct a DLQ record, stamping `failed_at_epoch_ms` from `failed_at`.
    pub fn new(
        event_id: u64,
        original_topic: impl Into<String>,
        original_payload: Vec<u8>,
        exception_type: impl Into<String>,
        exception_message: impl Into<String>,
        failed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id,
            original_topic: original_topic.into(),
            original_payload,
            exception_type: exception_type.into(),
            exception_message: exception_message.into(),
            failed_at_epoch_ms: failed_at.timestamp_millis(),
        }
    }

    /// The backup file name this record is written under: `{event_id}.json`.
    pub fn backup_file_name(&self) -> String {
        format!("{}.json", self.event_id)
    }
}
