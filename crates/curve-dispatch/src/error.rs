//! Dispatch error vocabulary.

/// Error returned by a [`crate::BrokerClient`] send attempt.
#[derive(Debug, thiserror::Error)]
pub enum BrokerSendError {
    /// The send did not complete within the configured timeout.
    #[error("broker send to topic {topic} timed out")]
    Timeout {
        /// Topic the send targeted.
        topic: String,
    },
    /// The broker client itself reported a failure.
    #[error("broker send to topic {topic} failed: {message}")]
    Rejected {
        /// Topic the send targeted.
        topic: String,
        /// Broker-reported failure message.
        message: String,
    },
}

/// Final outcome of a [`crate::Dispatcher::publish`] call that exhausted all
/// three recovery tiers.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The configured [`crate::PayloadStamper`] could not set `published_at`
    /// on the encoded payload; the event never reaches Tier 1 (§7 kind 2,
    /// Serialization).
    #[error("failed to stamp published_at for event {event_id}: {source}")]
    Stamping {
        /// Id of the event whose payload could not be stamped.
        event_id: u64,
        /// The underlying stamping failure.
        #[source]
        source: crate::stamp::StampError,
    },
    /// Tier 1 (main topic) failed, and Tier 2 (DLQ) also failed.
    #[error("main topic send and DLQ send both failed for event {event_id}: {dlq_error}")]
    DlqAlsoFailed {
        /// Id of the event that could not be dispatched.
        event_id: u64,
        /// The DLQ send failure.
        dlq_error: BrokerSendError,
    },
    /// All three tiers failed: main topic, DLQ, and the local backup write.
    #[error("main topic, DLQ, and local backup all failed for event {event_id}: {backup_error}")]
    BackupAlsoFailed {
        /// Id of the event that could not be dispatched.
        event_id: u64,
        /// The backup file write failure.
        backup_error: String,
    },
    /// The backup file was written but owner-only permissions could not be
    /// applied, and the dispatcher is configured for production: this is
    /// treated as a hard failure rather than a silent downgrade.
    #[error("backup file for event {event_id} written but permissions could not be restricted in production mode: {source}")]
    BackupPermissionsRejected {
        /// Id of the event whose backup file permissions could not be set.
        event_id: u64,
        /// Underlying I/O error from `set_permissions`.
        #[source]
        source: std::io::Error,
    },
}
