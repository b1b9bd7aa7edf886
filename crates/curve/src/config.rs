//! Layered configuration, rooted at the `curve.*` namespace: defaults,
//! an optional file, then `CURVE__`-prefixed environment overrides, in
//! that order of increasing precedence.

use std::time::Duration as StdDuration;

use chrono::Duration as ChronoDuration;
use curve_outbox_core::SchemaLifecycle;
use serde::Deserialize;

use crate::error::CurveError;

/// Retry/backoff parameters, shared shape for the dispatch-tier and
/// outbox-tier retry policies (they are configured independently —
/// see [`DispatchSection::retry`] and [`PublisherSection::retry`]).
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySection {
    /// Maximum attempts before giving up.
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds.
    pub initial_interval_ms: i64,
    /// Multiplier applied to the delay after each attempt.
    pub multiplier: f64,
    /// Upper bound on the delay, in milliseconds.
    pub max_interval_ms: i64,
}

impl RetrySection {
    fn to_policy(&self) -> Result<curve_retry::RetryPolicy, CurveError> {
        curve_retry::RetryPolicy::new(
            self.max_attempts,
            ChronoDuration::milliseconds(self.initial_interval_ms),
            self.multiplier,
            ChronoDuration::milliseconds(self.max_interval_ms),
        )
        .map_err(CurveError::RetryPolicy)
    }
}

/// Producing-service identity, stamped onto every envelope's
/// `metadata.source`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceSection {
    /// Logical service name.
    pub service_name: Option<String>,
    /// Deployed service version.
    pub service_version: Option<String>,
    /// Instance identifier.
    pub instance_id: Option<String>,
    /// Host name or address.
    pub host: Option<String>,
}

impl SourceSection {
    pub(crate) fn to_metadata(&self) -> curve_types::SourceMetadata {
        curve_types::SourceMetadata {
            service_name: self.service_name.clone(),
            service_version: self.service_version.clone(),
            instance_id: self.instance_id.clone(),
            host: self.host.clone(),
            correlation_id: None,
            causation_id: None,
        }
    }
}

/// Which wire codec to use and, for the non-JSON variants, where its
/// schema registry lives. Mirrors `serde.type ∈ {JSON, AVRO, PROTOBUF}`
/// (§6); `Avro` and `Protobuf` both select the same fixed-schema
/// MessagePack-under-a-registry codec (`curve_codec::BinaryCodec`) — this
/// crate has one binary wire representation, not three, so both names
/// route to it rather than staying unimplemented.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CodecKind {
    /// Human-readable JSON, the default.
    Json,
    /// Schema-registry-backed binary wire format, Avro naming.
    Avro,
    /// Schema-registry-backed binary wire format, Protobuf naming.
    Protobuf,
}

impl CodecKind {
    fn requires_schema_registry(&self) -> bool {
        !matches!(self, CodecKind::Json)
    }
}

impl Default for CodecKind {
    fn default() -> Self {
        CodecKind::Json
    }
}

/// Codec selection section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CodecSection {
    /// Which codec to construct.
    #[serde(default)]
    pub kind: CodecKind,
    /// Required when `kind = binary`.
    pub schema_registry_url: Option<String>,
}

/// Key-material mode backing the ENCRYPT PII strategy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyMode {
    /// A single static 32-byte key, hex-encoded.
    Static,
    /// Envelope encryption under a 32-byte master key, hex-encoded.
    Envelope,
}

/// PII transform section. Declaring this section wires a [`curve_pii::PiiTransformer`]
/// into the codec; the field-level schema itself (which paths are
/// sensitive) is supplied programmatically via [`crate::CurveBuilder::with_pii_schema`],
/// since it is a property of the payload type, not of deployment config.
#[derive(Debug, Clone, Deserialize)]
pub struct PiiSection {
    /// Salt for the HASH strategy's HMAC-SHA256 construction.
    pub hash_salt: String,
    /// Key mode for the ENCRYPT strategy.
    pub key_mode: KeyMode,
    /// Hex-encoded 32-byte key material.
    pub key_hex: String,
    /// DEK cache TTL in seconds, only meaningful in envelope mode.
    #[serde(default = "default_dek_cache_ttl_secs")]
    pub dek_cache_ttl_secs: u64,
    /// DEK cache capacity, only meaningful in envelope mode.
    #[serde(default = "default_dek_cache_capacity")]
    pub dek_cache_capacity: usize,
}

fn default_dek_cache_ttl_secs() -> u64 {
    300
}

fn default_dek_cache_capacity() -> usize {
    256
}

/// Broker dispatch section (§4.6): topics, timeouts, and the Tier-1 retry
/// policy.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchSection {
    /// Tier 1 topic.
    pub main_topic: String,
    /// Tier 2 (DLQ) topic.
    pub dlq_topic: String,
    /// Tier 3 local backup directory.
    pub backup_dir: String,
    /// Per-send timeout, in milliseconds.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Tier 1 retry policy.
    pub retry: RetrySection,
    /// Whether Tier 3 backups are also mirrored to an object store.
    #[serde(default)]
    pub s3_enabled: bool,
    /// Bucket name; required when `s3_enabled = true` (§6 cross-field check).
    pub s3_bucket: Option<String>,
    /// Key prefix under `s3_bucket`.
    pub s3_prefix: Option<String>,
}

fn default_send_timeout_ms() -> u64 {
    5_000
}

/// Outbox schema-lifecycle section (§4.4, §6 `outbox.*`). Governs whether a
/// driver that supports it (`curve-outbox-postgres`) auto-creates its
/// schema; the core "never silently migrates" an externally managed one.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboxSection {
    /// `embedded` / `always` / `never`. Passed to
    /// `curve_outbox_postgres::PostgresOutboxStore::open`/`from_pool` by
    /// deployments that construct that driver themselves; the facade does
    /// not construct a store (see [`crate::CurveBuilder::with_store`]), so
    /// this only has an effect if the caller threads it through.
    #[serde(default = "default_initialize_schema")]
    pub initialize_schema: SchemaLifecycle,
}

impl Default for OutboxSection {
    fn default() -> Self {
        Self { initialize_schema: default_initialize_schema() }
    }
}

fn default_initialize_schema() -> SchemaLifecycle {
    SchemaLifecycle::Always
}

/// Outbox publisher loop section (§4.5).
#[derive(Debug, Clone, Deserialize)]
pub struct PublisherSection {
    /// Sleep between poll iterations, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Configured batch size, clamped to `[1, 1000]` at use.
    #[serde(default = "default_base_batch_size")]
    pub base_batch_size: usize,
    /// Whether batch size scales with backlog depth.
    #[serde(default = "default_true")]
    pub dynamic_batching: bool,
    /// Outbox-row-level retry policy, independent of [`DispatchSection::retry`].
    pub retry: RetrySection,
    /// How long the circuit breaker stays OPEN, in milliseconds.
    #[serde(default = "default_circuit_open_duration_ms")]
    pub circuit_open_duration_ms: i64,
    /// Interval between cleanup task runs, in milliseconds.
    #[serde(default = "default_cleanup_interval_ms")]
    pub cleanup_interval_ms: u64,
    /// Retention window for PUBLISHED rows, in days.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Grace period before forcibly cancelling background tasks on shutdown.
    #[serde(default = "default_shutdown_grace_period_ms")]
    pub shutdown_grace_period_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}
fn default_base_batch_size() -> usize {
    100
}
fn default_true() -> bool {
    true
}
fn default_circuit_open_duration_ms() -> i64 {
    60_000
}
fn default_cleanup_interval_ms() -> u64 {
    3_600_000
}
fn default_retention_days() -> i64 {
    7
}
fn default_shutdown_grace_period_ms() -> u64 {
    30_000
}

/// Clock-backwards recovery policy for Snowflake id generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockBackwardsMode {
    /// Sleep out the drift and retry.
    WaitAndRetry,
    /// Return an error immediately.
    FailFast,
}

impl From<ClockBackwardsMode> for curve_ids::ClockBackwardsPolicy {
    fn from(mode: ClockBackwardsMode) -> Self {
        match mode {
            ClockBackwardsMode::WaitAndRetry => curve_ids::ClockBackwardsPolicy::WaitAndRetry,
            ClockBackwardsMode::FailFast => curve_ids::ClockBackwardsPolicy::FailFast,
        }
    }
}

/// Root configuration, deserialized from the `curve.*` namespace.
#[derive(Debug, Clone, Deserialize)]
pub struct CurveConfig {
    /// This process's Snowflake worker id, `0..=1023`.
    pub worker_id: u16,
    /// Custom epoch, in Unix milliseconds. Defaults to [`curve_ids::DEFAULT_EPOCH_MS`].
    #[serde(default = "default_epoch_ms")]
    pub epoch_ms: i64,
    /// Clock-backwards recovery policy.
    #[serde(default = "default_clock_backwards_mode")]
    pub clock_backwards: ClockBackwardsMode,
    /// Whether this process runs in production (governs Tier 3 backup
    /// permission-failure handling).
    #[serde(default)]
    pub is_production: bool,
    /// Producing-service identity.
    #[serde(default)]
    pub source: SourceSection,
    /// Wire codec selection.
    #[serde(default)]
    pub codec: CodecSection,
    /// PII transform wiring, absent if the deployment declares no
    /// sensitive fields.
    pub pii: Option<PiiSection>,
    /// Broker dispatch configuration.
    pub dispatch: DispatchSection,
    /// Outbox schema-lifecycle configuration.
    #[serde(default)]
    pub outbox: OutboxSection,
    /// Outbox publisher configuration.
    pub publisher: PublisherSection,
}

fn default_epoch_ms() -> i64 {
    curve_ids::DEFAULT_EPOCH_MS
}
fn default_clock_backwards_mode() -> ClockBackwardsMode {
    ClockBackwardsMode::WaitAndRetry
}

impl CurveConfig {
    /// Load configuration from an optional file plus `CURVE__`-prefixed
    /// environment variables (double underscore as the nested-key
    /// separator, e.g. `CURVE__DISPATCH__MAIN_TOPIC`), environment taking
    /// precedence over the file.
    pub fn load(file_path: Option<&str>) -> Result<Self, CurveError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file_path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("CURVE").separator("__").try_parsing(true),
        );
        let raw = builder.build().map_err(CurveError::Config)?;
        let config: Self = raw.try_deserialize().map_err(CurveError::Config)?;
        config.validate()?;
        Ok(config)
    }

    /// Eagerly validate cross-field constraints (§6: "Validation runs once
    /// at startup; any violation aborts initialization with a message
    /// naming the offending key and value"). Called by [`Self::load`];
    /// deployments that build a `CurveConfig` literal directly (bypassing
    /// `load`) should call this themselves before [`crate::CurveBuilder::build`]
    /// does so again.
    pub fn validate(&self) -> Result<(), CurveError> {
        if self.dispatch.main_topic.trim().is_empty() {
            return Err(CurveError::InvalidConfig {
                key: "dispatch.main_topic",
                value: self.dispatch.main_topic.clone(),
                reason: "required, must be non-empty",
            });
        }

        if self.dispatch.s3_enabled {
            let bucket_set = self.dispatch.s3_bucket.as_deref().map(|b| !b.trim().is_empty()).unwrap_or(false);
            if !bucket_set {
                return Err(CurveError::InvalidConfig {
                    key: "dispatch.s3_bucket",
                    value: self.dispatch.s3_bucket.clone().unwrap_or_default(),
                    reason: "required when dispatch.s3_enabled = true",
                });
            }
        }

        if self.codec.kind.requires_schema_registry() {
            let url_set = self.codec.schema_registry_url.as_deref().map(|u| !u.trim().is_empty()).unwrap_or(false);
            if !url_set {
                return Err(CurveError::InvalidConfig {
                    key: "codec.schema_registry_url",
                    value: self.codec.schema_registry_url.clone().unwrap_or_default(),
                    reason: "required when codec.kind != JSON",
                });
            }
        }

        Ok(())
    }

    pub(crate) fn dispatch_retry_policy(&self) -> Result<curve_retry::RetryPolicy, CurveError> {
        self.dispatch.retry.to_policy()
    }

    pub(crate) fn publisher_retry_policy(&self) -> Result<curve_retry::RetryPolicy, CurveError> {
        self.publisher.retry.to_policy()
    }

    pub(crate) fn send_timeout(&self) -> StdDuration {
        StdDuration::from_millis(self.dispatch.send_timeout_ms)
    }

    pub(crate) fn poll_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.publisher.poll_interval_ms)
    }

    pub(crate) fn cleanup_interval(&self) -> StdDuration {
        StdDuration::from_millis(self.publisher.cleanup_interval_ms)
    }

    pub(crate) fn shutdown_grace_period(&self) -> StdDuration {
        StdDuration::from_millis(self.publisher.shutdown_grace_period_ms)
    }

    pub(crate) fn circuit_open_duration(&self) -> ChronoDuration {
        ChronoDuration::milliseconds(self.publisher.circuit_open_duration_ms)
    }

    pub(crate) fn retention(&self) -> ChronoDuration {
        ChronoDuration::days(self.publisher.retention_days)
    }
}
