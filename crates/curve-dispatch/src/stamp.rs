//! The dispatcher's view onto the wire codec: just enough to rewrite
//! `published_at` on an already-encoded payload immediately before the
//! broker write (§4.1: "`published_at` is stamped by the dispatcher
//! immediately before broker write"). The dispatcher never needs the
//! payload's original type to do this — both wire formats carry
//! `published_at` as a field of the envelope itself, not the payload.

use chrono::{DateTime, Utc};

/// Rewrites `published_at` on an already-serialized envelope.
pub trait PayloadStamper: Send + Sync {
    /// Return `payload` with its `published_at` field set to `now`.
    fn stamp_published_at(&self, payload: &[u8], now: DateTime<Utc>) -> Result<Vec<u8>, StampError>;
}

/// A [`PayloadStamper`] failed to rewrite an envelope's `published_at`
/// field, most likely because `payload` was not bytes it encoded.
#[derive(Debug, thiserror::Error)]
#[error("failed to stamp published_at on encoded payload: {0}")]
pub struct StampError(pub String);

/// A stamper that returns `payload` unchanged. Does not satisfy the §4.1
/// `published_at` invariant; exists for tests that dispatch raw,
/// non-envelope bytes and have no codec to delegate to.
pub struct NoopStamper;

impl PayloadStamper for NoopStamper {
    fn stamp_published_at(&self, payload: &[u8], _now: DateTime<Utc>) -> Result<Vec<u8>, StampError> {
        Ok(payload.to_vec())
    }
}
