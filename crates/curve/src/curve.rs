//! The assembled pipeline (§4): one payload type `P` through envelope
//! assembly, PII transform, wire encoding, and the outbox.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use curve_assembler::{CompositeContextProvider, EnvelopeAssembler, NoActor, NoSchemaOrTags, NoTrace, StaticSource, SystemClock};
use curve_codec::{BinaryCodec, CodecError, JsonCodec};
use curve_dispatch::{PayloadStamper, StampError};
use curve_outbox_core::{OutboxRecord, OutboxStore};
use curve_publisher::{Publisher, PublisherHandle};
use curve_types::{EventEnvelope, Severity};
use serde::Serialize;

use crate::error::CurveError;

type DefaultContext = CompositeContextProvider<NoActor, NoTrace, StaticSource, NoSchemaOrTags, NoSchemaOrTags>;
type DefaultAssembler<P> = EnvelopeAssembler<P, SystemClock, DefaultContext>;

/// Either wire codec, selected at build time from [`crate::config::CodecSection`].
pub(crate) enum Codec {
    /// The default, human-readable codec.
    Json(JsonCodec),
    /// The schema-registry-backed binary codec.
    Binary(BinaryCodec),
}

impl Codec {
    async fn encode<P: Serialize + Send + Sync>(&self, envelope: &EventEnvelope<P>) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::Json(codec) => codec.encode(envelope).await,
            Codec::Binary(codec) => codec.encode(envelope).await,
        }
    }
}

impl PayloadStamper for Codec {
    /// Rewrite `published_at` on an already-encoded envelope at the broker
    /// boundary, delegating to whichever wire codec produced it.
    fn stamp_published_at(&self, payload: &[u8], now: DateTime<Utc>) -> Result<Vec<u8>, StampError> {
        let result = match self {
            Codec::Json(codec) => codec.restamp_published_at(payload, now),
            Codec::Binary(codec) => codec.restamp_published_at(payload, now),
        };
        result.map_err(|e| StampError(e.to_string()))
    }
}

/// A fully wired curve pipeline for one payload type `P`, backed by outbox
/// store `S`.
///
/// Construct via [`crate::CurveBuilder`]; this type has no public
/// constructor of its own because assembling it correctly requires the
/// builder's validation (broker/store presence, PII schema/config pairing).
pub struct Curve<P, S: OutboxStore> {
    pub(crate) assembler: DefaultAssembler<P>,
    pub(crate) codec: Arc<Codec>,
    pub(crate) store: Arc<S>,
    pub(crate) publisher: Arc<Publisher<S>>,
}

impl<P, S> Curve<P, S>
where
    P: Serialize + Send + Sync,
    S: OutboxStore + 'static,
{
    /// Assemble an envelope from `payload`, transform and encode it, and
    /// stage it in the outbox within the same call. Returns the minted
    /// event id.
    ///
    /// This does not itself dispatch to the broker — that's the publisher
    /// loop's job (see [`Self::spawn_publisher`]). Callers that need the
    /// row staged inside their own business transaction should use the
    /// lower-level crates directly instead of the facade.
    pub async fn record(
        &self,
        payload: P,
        event_type: impl Into<String>,
        severity: Severity,
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
    ) -> Result<u64, CurveError> {
        let event_type = event_type.into();
        let envelope = self.assembler.build(payload, event_type.clone(), severity)?;
        let event_id = envelope.event_id;
        let occurred_at = envelope.occurred_at;

        let metadata_bytes = serde_json::to_vec(&envelope.metadata).map_err(CurveError::Metadata)?;
        let payload_bytes = self.codec.encode(&envelope).await?;

        let record = OutboxRecord::new(
            event_id,
            aggregate_type,
            aggregate_id,
            event_type,
            payload_bytes,
            metadata_bytes,
            occurred_at,
        );
        self.store.save(record).await?;

        Ok(event_id)
    }

    /// The underlying outbox store, for callers that want to stage rows
    /// inside their own business transaction alongside [`Self::record`].
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The underlying publisher, for direct access to `run_iteration`/
    /// `run_cleanup` or the circuit breaker's diagnostics.
    pub fn publisher(&self) -> &Arc<Publisher<S>> {
        &self.publisher
    }

    /// Spawn the background poll and cleanup tasks. Call `shutdown` on the
    /// returned handle to drain in-flight work gracefully.
    pub fn spawn_publisher(self: &Arc<Self>) -> PublisherHandle {
        curve_publisher::spawn(self.publisher.clone())
    }
}
