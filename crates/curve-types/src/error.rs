//! Shared error vocabulary.
//!
//! Each `curve-*` crate defines its own `thiserror` enum at its boundary
//! (one per `BusError`/`StorageError`/`RateLimitError`-style module); this
//! module only holds the taxonomy *kinds* used to tag log lines and
//! metrics consistently across crates without forcing a single monolithic
//! error type.

use serde::{Deserialize, Serialize};

/// Errors constructing basic data-model values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CurveTypeError {
    /// `SchemaMetadata::version` was zero.
    #[error("schema version must be >= 1")]
    InvalidSchemaVersion,
}

/// Coarse-grained error taxonomy, used for log/metric tagging across crate
/// boundaries. Not a `std::error::Error` itself — it classifies a concrete
/// error raised elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Startup configuration violation; fatal.
    Configuration,
    /// Envelope never reached Tier 1; surfaced to the `publish` caller.
    Serialization,
    /// Transient broker failure; retried under the Tier 1 policy.
    BrokerTransient,
    /// Terminal broker failure; triggers Tier 2 (DLQ).
    BrokerTerminal,
    /// DLQ send failed; triggers Tier 3 (local backup).
    DlqFailure,
    /// Local backup write failed.
    BackupFailure,
    /// Clock moved backwards by more than the tolerance window.
    ClockBackwards,
    /// Key provider could not supply or use a key; ENCRYPT fields fail.
    KeyProviderFailure,
    /// Outbox database operation failed; publisher iteration aborts.
    OutboxDatabase,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Serialization => "serialization",
            ErrorKind::BrokerTransient => "broker_transient",
            ErrorKind::BrokerTerminal => "broker_terminal",
            ErrorKind::DlqFailure => "dlq_failure",
            ErrorKind::BackupFailure => "backup_failure",
            ErrorKind::ClockBackwards => "clock_backwards",
            ErrorKind::KeyProviderFailure => "key_provider_failure",
            ErrorKind::OutboxDatabase => "outbox_database",
        };
        f.write_str(s)
    }
}
