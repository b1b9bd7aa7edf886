//! Binary schema-registry codec (§4.7). Serializes the envelope under a
//! fixed MessagePack schema, with `metadata.tags` and `payload` held as
//! opaque JSON-encoded strings — this anchors the envelope's wire shape
//! (for schema-registry compatibility checks) while leaving the payload and
//! tag map free to evolve.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use curve_pii::PiiTransformer;
use curve_types::{ActorMetadata, EventEnvelope, EventMetadata, SchemaMetadata, Severity, SourceMetadata, TraceMetadata};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CodecError;
use crate::path::get_mut_by_path;

#[derive(Debug, Serialize, Deserialize)]
struct BinaryWireEnvelope {
    event_id: u64,
    event_type: String,
    severity: Severity,
    occurred_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
    source: SourceMetadata,
    actor: ActorMetadata,
    trace: TraceMetadata,
    schema: Option<SchemaMetadata>,
    /// JSON-encoded `metadata.tags`, kept opaque to the fixed schema.
    tags_json: String,
    /// JSON-encoded, PII-transformed payload, kept opaque to the fixed schema.
    payload_json: String,
}

/// Serializes envelopes under a fixed binary schema for use with a schema
/// registry; requires a non-empty registry URL at construction (§6
/// cross-field check: `serde.type != JSON` implies `schema-registry-url` is
/// required).
pub struct BinaryCodec {
    #[allow(dead_code)]
    schema_registry_url: String,
    pii: Option<Arc<PiiTransformer>>,
}

impl BinaryCodec {
    /// Construct a binary codec bound to a schema-registry URL, rejecting
    /// an empty one.
    pub fn new(schema_registry_url: impl Into<String>, pii: Option<Arc<PiiTransformer>>) -> Result<Self, CodecError> {
        let schema_registry_url = schema_registry_url.into();
        if schema_registry_url.trim().is_empty() {
            return Err(CodecError::MissingSchemaRegistryUrl);
        }
        Ok(Self { schema_registry_url, pii })
    }

    /// Serialize an envelope to MessagePack bytes under the fixed wire
    /// schema, transforming declared PII fields in the payload first.
    pub async fn encode<P: Serialize>(&self, envelope: &EventEnvelope<P>) -> Result<Vec<u8>, CodecError> {
        let mut payload_value = serde_json::to_value(&envelope.payload).map_err(CodecError::Serde)?;

        if let Some(pii) = &self.pii {
            for (path, _spec) in pii.schema().iter() {
                if let Some(Value::String(s)) = get_mut_by_path(&mut payload_value, path) {
                    let transformed = pii.transform_field(path, s).await?;
                    *s = transformed;
                }
            }
        }

        let wire = BinaryWireEnvelope {
            event_id: envelope.event_id,
            event_type: envelope.event_type.clone(),
            severity: envelope.severity,
            occurred_at: envelope.occurred_at,
            published_at: envelope.published_at,
            source: envelope.metadata.source.clone(),
            actor: envelope.metadata.actor.clone(),
            trace: envelope.metadata.trace.clone(),
            schema: envelope.metadata.schema.clone(),
            tags_json: serde_json::to_string(&envelope.metadata.tags).map_err(CodecError::Serde)?,
            payload_json: serde_json::to_string(&payload_value).map_err(CodecError::Serde)?,
        };

        rmp_serde::to_vec_named(&wire).map_err(|e| CodecError::Rmp(e.to_string()))
    }

    /// Parse MessagePack bytes back into a typed envelope. Does not reverse
    /// any PII transform applied during [`Self::encode`].
    pub fn decode<P: DeserializeOwned>(&self, bytes: &[u8]) -> Result<EventEnvelope<P>, CodecError> {
        let wire: BinaryWireEnvelope = rmp_serde::from_slice(bytes).map_err(|e| CodecError::Rmp(e.to_string()))?;

        let tags: HashMap<String, String> = serde_json::from_str(&wire.tags_json).map_err(CodecError::Serde)?;
        let payload: P = serde_json::from_str(&wire.payload_json).map_err(CodecError::Serde)?;

        Ok(EventEnvelope {
            event_id: wire.event_id,
            event_type: wire.event_type,
            severity: wire.severity,
            occurred_at: wire.occurred_at,
            published_at: wire.published_at,
            metadata: EventMetadata { source: wire.source, actor: wire.actor, trace: wire.trace, schema: wire.schema, tags },
            payload,
        })
    }

    /// Rewrite the `published_at` field of already-encoded bytes to `now`,
    /// without re-running the PII transform: the dispatcher stamps
    /// `published_at` post-serialize, pre-ack (§4.1), long after PII
    /// transformation already happened at encode time. Decodes into an
    /// opaque `serde_json::Value` payload so no knowledge of the original
    /// payload type is needed.
    pub fn restamp_published_at(&self, bytes: &[u8], now: DateTime<Utc>) -> Result<Vec<u8>, CodecError> {
        let mut envelope: EventEnvelope<Value> = self.decode(bytes)?;
        envelope.stamp_published_at(now);

        let wire = BinaryWireEnvelope {
            event_id: envelope.event_id,
            event_type: envelope.event_type,
            severity: envelope.severity,
            occurred_at: envelope.occurred_at,
            published_at: envelope.published_at,
            source: envelope.metadata.source,
            actor: envelope.metadata.actor,
            trace: envelope.metadata.trace,
            schema: envelope.metadata.schema,
            tags_json: serde_json::to_string(&envelope.metadata.tags).map_err(CodecError::Serde)?,
            payload_json: serde_json::to_string(&envelope.payload).map_err(CodecError::Serde)?,
        };

        rmp_serde::to_vec_named(&wire).map_err(|e| CodecError::Rmp(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_types::{PiiSchema, PiiStrategy, PiiType};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct OrderPayload {
        order_id: String,
        email: String,
    }

    fn sample_envelope() -> EventEnvelope<OrderPayload> {
        EventEnvelope {
            event_id: 7,
            event_type: "ORDER_CREATED".to_string(),
            severity: Severity::Info,
            occurred_at: Utc::now(),
            published_at: None,
            metadata: EventMetadata::default(),
            payload: OrderPayload { order_id: "o-1".to_string(), email: "jane.doe@example.com".to_string() },
        }
    }

    #[test]
    fn rejects_empty_schema_registry_url() {
        let err = BinaryCodec::new("", None).unwrap_err();
        assert!(matches!(err, CodecError::MissingSchemaRegistryUrl));
    }

    #[tokio::test]
    async fn round_trips_without_pii() {
        let codec = BinaryCodec::new("https://registry.internal", None).unwrap();
        let envelope = sample_envelope();
        let bytes = codec.encode(&envelope).await.unwrap();
        let decoded: EventEnvelope<OrderPayload> = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.payload, envelope.payload);
        assert_eq!(decoded.event_id, envelope.event_id);
    }

    #[tokio::test]
    async fn masks_declared_payload_field_in_opaque_json() {
        let schema = PiiSchema::builder().field("email", PiiType::Email, PiiStrategy::Mask).build();
        let provider = Arc::new(curve_pii::LocalEnvelopeKeyProvider::new([2u8; 32]));
        let transformer = Arc::new(PiiTransformer::new(schema, b"salt".to_vec(), provider, None));
        let codec = BinaryCodec::new("https://registry.internal", Some(transformer)).unwrap();

        let bytes = codec.encode(&sample_envelope()).await.unwrap();
        let decoded: EventEnvelope<OrderPayload> = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.payload.email, "j***@ex***.com");
    }

    #[tokio::test]
    async fn restamp_published_at_sets_the_field_without_touching_pii() {
        let schema = PiiSchema::builder().field("email", PiiType::Email, PiiStrategy::Mask).build();
        let provider = Arc::new(curve_pii::LocalEnvelopeKeyProvider::new([3u8; 32]));
        let transformer = Arc::new(PiiTransformer::new(schema, b"salt".to_vec(), provider, None));
        let codec = BinaryCodec::new("https://registry.internal", Some(transformer)).unwrap();

        let bytes = codec.encode(&sample_envelope()).await.unwrap();
        let now = Utc::now();
        let restamped = codec.restamp_published_at(&bytes, now).unwrap();

        let decoded: EventEnvelope<OrderPayload> = codec.decode(&restamped).unwrap();
        assert_eq!(decoded.published_at, Some(now));
        assert_eq!(decoded.payload.email, "j***@ex***.com", "restamping must not re-apply the PII transform");
    }
}
