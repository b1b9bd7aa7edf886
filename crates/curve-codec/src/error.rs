//! Codec error vocabulary.

use curve_pii::PiiError;

/// Errors raised encoding or decoding an envelope.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The JSON or MessagePack layer itself failed.
    #[error("serialization failed: {0}")]
    Serde(#[source] serde_json::Error),
    /// The MessagePack layer failed (binary codec only).
    #[error("binary serialization failed: {0}")]
    Rmp(String),
    /// A field declared PII-sensitive failed to transform.
    #[error("PII transform failed: {0}")]
    Pii(#[from] PiiError),
    /// The serialized envelope had no `payload` field to transform.
    #[error("serialized envelope is missing its payload field")]
    MissingPayloadField,
    /// A `schema-registry-url` is required when the binary codec is used.
    #[error("binary codec requires a non-empty schema-registry-url")]
    MissingSchemaRegistryUrl,
}
