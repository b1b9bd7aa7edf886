//! Facade error vocabulary. Wraps the lower-level crate errors a caller can
//! hit while loading configuration, building a pipeline, or recording an
//! event through it.

/// Errors raised by [`crate::CurveConfig::load`] or [`crate::CurveBuilder::build`].
#[derive(Debug, thiserror::Error)]
pub enum CurveError {
    /// Configuration could not be loaded or failed to deserialize.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    /// A retry policy section had invalid parameters.
    #[error("invalid retry policy: {0}")]
    RetryPolicy(#[from] curve_retry::RetryPolicyError),
    /// `pii` was declared in config but no schema was supplied via
    /// [`crate::CurveBuilder::with_pii_schema`], or vice versa.
    #[error("PII config and PII schema must be supplied together: {0}")]
    PiiConfigMismatch(&'static str),
    /// The configured key material was malformed.
    #[error("PII key material error: {0}")]
    Key(#[from] curve_pii::KeyProviderError),
    /// The hex-encoded key material did not decode.
    #[error("PII key material is not valid hex: {0}")]
    InvalidKeyHex(#[from] hex::FromHexError),
    /// `codec.kind = binary` requires `codec.schema_registry_url`.
    #[error("binary codec requires codec.schema_registry_url")]
    MissingSchemaRegistryUrl,
    /// [`crate::CurveBuilder::build`] was called without a broker client.
    #[error("no broker client configured; call CurveBuilder::with_broker")]
    MissingBroker,
    /// [`crate::CurveBuilder::build`] was called without an outbox store.
    #[error("no outbox store configured; call CurveBuilder::with_store")]
    MissingStore,
    /// Envelope assembly failed (empty event type or id generation).
    #[error("envelope assembly failed: {0}")]
    Assembler(#[from] curve_assembler::AssemblerError),
    /// Encoding the envelope to wire bytes failed.
    #[error("envelope encoding failed: {0}")]
    Codec(#[from] curve_codec::CodecError),
    /// Constructing the binary codec failed.
    #[error("binary codec construction failed: {0}")]
    CodecInit(curve_codec::CodecError),
    /// The outbox store rejected the save.
    #[error("outbox store error: {0}")]
    Outbox(#[from] curve_outbox_core::OutboxError),
    /// Serializing the envelope's metadata column failed.
    #[error("failed to serialize envelope metadata: {0}")]
    Metadata(#[source] serde_json::Error),
    /// The Snowflake generator could not be constructed (worker id out of range).
    #[error("id generator construction failed: {0}")]
    Snowflake(#[from] curve_ids::SnowflakeError),
    /// A configuration key failed eager validation (§6: "aborts
    /// initialization with a message naming the offending key and value").
    #[error("invalid configuration: {key} = {value:?}: {reason}")]
    InvalidConfig {
        /// Dotted config key that failed validation.
        key: &'static str,
        /// The offending value, as configured.
        value: String,
        /// Why the value is rejected.
        reason: &'static str,
    },
}
