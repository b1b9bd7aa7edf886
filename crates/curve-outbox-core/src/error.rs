//! Outbox store error vocabulary.

/// Errors raised by an [`crate::OutboxStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    /// The backing store itself failed (connection, query, I/O).
    #[error("outbox backend error: {0}")]
    Backend(String),
    /// A row transition was attempted that the status DAG forbids.
    #[error("illegal outbox status transition for row {id}")]
    IllegalTransition {
        /// Id of the row whose transition was rejected.
        id: u64,
    },
    /// A row referenced by id doesn't exist.
    #[error("outbox row {0} not found")]
    NotFound(u64),
}
