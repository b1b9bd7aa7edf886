//! JSON codec (§4.7, default). Deterministic field order, ISO-8601 UTC
//! millisecond timestamps (via `chrono`'s `Serialize`), exact integers,
//! nulls preserved. PII transforms are applied to the serialized payload
//! value before the final bytes are produced.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use curve_pii::PiiTransformer;
use curve_types::EventEnvelope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::CodecError;
use crate::path::get_mut_by_path;

/// Serializes envelopes to UTF-8 JSON, applying the declared PII schema (if
/// any) to the payload before emitting bytes.
pub struct JsonCodec {
    pii: Option<Arc<PiiTransformer>>,
}

impl JsonCodec {
    /// Construct a codec, optionally wired to a PII transformer. `None`
    /// disables the PII stack entirely (payloads are emitted as-is).
    pub fn new(pii: Option<Arc<PiiTransformer>>) -> Self {
        Self { pii }
    }

    /// Serialize an envelope to JSON bytes, transforming any payload field
    /// declared sensitive.
    pub async fn encode<P: Serialize>(&self, envelope: &EventEnvelope<P>) -> Result<Vec<u8>, CodecError> {
        let mut value = serde_json::to_value(envelope).map_err(CodecError::Serde)?;

        if let Some(pii) = &self.pii {
            let payload = value.get_mut("payload").ok_or(CodecError::MissingPayloadField)?;
            apply_pii_transform(payload, pii).await?;
        }

        serde_json::to_vec(&value).map_err(CodecError::Serde)
    }

    /// Parse JSON bytes back into a typed envelope. Does not reverse any
    /// PII transform; that requires the schema's ENCRYPT strategy and is
    /// the caller's responsibility via [`PiiTransformer::reverse_field`].
    pub fn decode<P: DeserializeOwned>(&self, bytes: &[u8]) -> Result<EventEnvelope<P>, CodecError> {
        serde_json::from_slice(bytes).map_err(CodecError::Serde)
    }

    /// Rewrite the `published_at` field of already-encoded bytes to `now`,
    /// without re-running the PII transform on the payload: the dispatcher
    /// stamps `published_at` post-serialize, pre-ack (§4.1), long after
    /// PII transformation already happened at encode time. The payload
    /// round-trips through `serde_json::Value`, so this needs no knowledge
    /// of the original payload type.
    pub fn restamp_published_at(&self, bytes: &[u8], now: DateTime<Utc>) -> Result<Vec<u8>, CodecError> {
        let mut envelope: EventEnvelope<Value> = self.decode(bytes)?;
        envelope.stamp_published_at(now);
        serde_json::to_vec(&envelope).map_err(CodecError::Serde)
    }
}

async fn apply_pii_transform(payload: &mut Value, pii: &PiiTransformer) -> Result<(), CodecError> {
    for (path, _spec) in pii.schema().iter() {
        if let Some(Value::String(s)) = get_mut_by_path(payload, path) {
            let transformed = pii.transform_field(path, s).await?;
            *s = transformed;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use curve_pii::{DekCache, LocalEnvelopeKeyProvider};
    use curve_types::{EventMetadata, PiiSchema, PiiStrategy, PiiType, Severity};
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct OrderPayload {
        order_id: String,
        email: String,
    }

    fn sample_envelope() -> EventEnvelope<OrderPayload> {
        EventEnvelope {
            event_id: 42,
            event_type: "ORDER_CREATED".to_string(),
            severity: Severity::Info,
            occurred_at: chrono::Utc::now(),
            published_at: None,
            metadata: EventMetadata::default(),
            payload: OrderPayload { order_id: "o-1".to_string(), email: "jane.doe@example.com".to_string() },
        }
    }

    #[tokio::test]
    async fn encodes_without_pii_schema() {
        let codec = JsonCodec::new(None);
        let bytes = codec.encode(&sample_envelope()).await.unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("jane.doe@example.com"));
    }

    #[tokio::test]
    async fn masks_declared_payload_field() {
        let schema = PiiSchema::builder().field("email", PiiType::Email, PiiStrategy::Mask).build();
        let provider = Arc::new(LocalEnvelopeKeyProvider::new([1u8; 32]));
        let cache = Arc::new(DekCache::new(Duration::from_secs(60), 16));
        let transformer = Arc::new(PiiTransformer::new(schema, b"salt".to_vec(), provider, Some(cache)));
        let codec = JsonCodec::new(Some(transformer));

        let bytes = codec.encode(&sample_envelope()).await.unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(!text.contains("jane.doe@example.com"));
        assert!(text.contains("j***@ex***.com"));
    }

    #[tokio::test]
    async fn restamp_published_at_sets_the_field_without_touching_pii() {
        let schema = PiiSchema::builder().field("email", PiiType::Email, PiiStrategy::Mask).build();
        let provider = Arc::new(LocalEnvelopeKeyProvider::new([1u8; 32]));
        let cache = Arc::new(DekCache::new(Duration::from_secs(60), 16));
        let transformer = Arc::new(PiiTransformer::new(schema, b"salt".to_vec(), provider, Some(cache)));
        let codec = JsonCodec::new(Some(transformer));

        let bytes = codec.encode(&sample_envelope()).await.unwrap();
        let now = chrono::Utc::now();
        let restamped = codec.restamp_published_at(&bytes, now).unwrap();

        let decoded: EventEnvelope<OrderPayload> = codec.decode(&restamped).unwrap();
        assert_eq!(decoded.published_at, Some(now));
        assert_eq!(decoded.payload.email, "j***@ex***.com", "restamping must not re-apply the PII transform");
    }

    #[tokio::test]
    async fn round_trips_through_decode_when_pii_disabled() {
        let codec = JsonCodec::new(None);
        let envelope = sample_envelope();
        let bytes = codec.encode(&envelope).await.unwrap();
        let decoded: EventEnvelope<OrderPayload> = codec.decode(&bytes).unwrap();
        assert_eq!(decoded.event_id, envelope.event_id);
        assert_eq!(decoded.payload.order_id, envelope.payload.order_id);
    }

    #[tokio::test]
    async fn field_order_is_declared_struct_order() {
        let codec = JsonCodec::new(None);
        let bytes = codec.encode(&sample_envelope()).await.unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let event_id_pos = text.find("\"event_id\"").unwrap();
        let payload_pos = text.find("\"payload\"").unwrap();
        assert!(event_id_pos < payload_pos, "event_id must precede payload in the declared field order");
    }
}
