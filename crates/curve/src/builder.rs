//! Composes the pipeline crates into a [`Curve`] from a [`CurveConfig`]
//! plus the collaborators a deployment must supply: a broker client, an
//! outbox store, and (for deployments with sensitive fields) a PII schema.

use std::marker::PhantomData;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use curve_assembler::{CompositeContextProvider, EnvelopeAssembler, NoActor, NoSchemaOrTags, NoTrace, StaticSource, SystemClock};
use curve_codec::{BinaryCodec, JsonCodec};
use curve_dispatch::{BrokerClient, DispatchConfig, Dispatcher};
use curve_ids::SnowflakeGenerator;
use curve_outbox_core::OutboxStore;
use curve_pii::{DekCache, KeyProvider, LocalEnvelopeKeyProvider, PiiTransformer, StaticKeyProvider};
use curve_publisher::{Publisher, PublisherConfig};
use curve_types::PiiSchema;

use crate::config::{CurveConfig, KeyMode};
use crate::curve::{Codec, Curve};
use crate::error::CurveError;

/// Builds a [`Curve`] pipeline for payload type `P`, backed by outbox
/// store `S`.
pub struct CurveBuilder<P, S: OutboxStore> {
    config: CurveConfig,
    pii_schema: Option<PiiSchema>,
    broker: Option<Arc<dyn BrokerClient>>,
    store: Option<Arc<S>>,
    _payload: PhantomData<fn() -> P>,
}

impl<P, S> CurveBuilder<P, S>
where
    P: serde::Serialize + Send + Sync + 'static,
    S: OutboxStore + 'static,
{
    /// Start building from a loaded configuration.
    pub fn new(config: CurveConfig) -> Self {
        Self { config, pii_schema: None, broker: None, store: None, _payload: PhantomData }
    }

    /// Declare which payload fields are sensitive. Required exactly when
    /// `config.pii` is present.
    pub fn with_pii_schema(mut self, schema: PiiSchema) -> Self {
        self.pii_schema = Some(schema);
        self
    }

    /// Supply the broker client this deployment dispatches through.
    pub fn with_broker(mut self, broker: Arc<dyn BrokerClient>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// Supply the outbox store this deployment persists through.
    pub fn with_store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// Assemble the pipeline, validating that every required collaborator
    /// was supplied and that `pii`/`with_pii_schema` are paired correctly.
    pub fn build(self) -> Result<Arc<Curve<P, S>>, CurveError> {
        let config = self.config;
        config.validate()?;

        let ids = SnowflakeGenerator::with_clock(
            config.worker_id,
            config.epoch_ms,
            config.clock_backwards.clone().into(),
            curve_ids::SystemClock,
        )?;
        let context = CompositeContextProvider::new(
            NoActor,
            NoTrace,
            StaticSource(config.source.to_metadata()),
            NoSchemaOrTags,
            NoSchemaOrTags,
        );
        let assembler = EnvelopeAssembler::new(SystemClock, ids, context);

        let pii_transformer = build_pii_transformer(&config, self.pii_schema)?;

        let codec = Arc::new(match config.codec.kind {
            crate::config::CodecKind::Json => Codec::Json(JsonCodec::new(pii_transformer)),
            crate::config::CodecKind::Avro | crate::config::CodecKind::Protobuf => {
                let url = config.codec.schema_registry_url.clone().ok_or(CurveError::MissingSchemaRegistryUrl)?;
                Codec::Binary(BinaryCodec::new(url, pii_transformer).map_err(CurveError::CodecInit)?)
            }
        });

        let broker = self.broker.ok_or(CurveError::MissingBroker)?;
        let dispatch_config = DispatchConfig {
            main_topic: config.dispatch.main_topic.clone(),
            dlq_topic: config.dispatch.dlq_topic.clone(),
            backup_dir: PathBuf::from(&config.dispatch.backup_dir),
            send_timeout: config.send_timeout(),
            retry_policy: config.dispatch_retry_policy()?,
            is_production: config.is_production,
        };
        let dispatcher = Arc::new(Dispatcher::new(broker, codec.clone(), dispatch_config));

        let store = self.store.ok_or(CurveError::MissingStore)?;
        let publisher_config = PublisherConfig {
            poll_interval: config.poll_interval(),
            base_batch_size: config.publisher.base_batch_size,
            dynamic_batching: config.publisher.dynamic_batching,
            retry_policy: config.publisher_retry_policy()?,
            circuit_open_duration: config.circuit_open_duration(),
            cleanup_interval: config.cleanup_interval(),
            retention: config.retention(),
            shutdown_grace_period: config.shutdown_grace_period(),
        };
        let publisher = Arc::new(Publisher::new(store.clone(), dispatcher, publisher_config));

        Ok(Arc::new(Curve { assembler, codec, store, publisher }))
    }
}

fn build_pii_transformer(config: &CurveConfig, schema: Option<PiiSchema>) -> Result<Option<Arc<PiiTransformer>>, CurveError> {
    match (schema, &config.pii) {
        (None, None) => Ok(None),
        (Some(_), None) => Err(CurveError::PiiConfigMismatch(
            "a PII schema was supplied but no [pii] config section is present",
        )),
        (None, Some(_)) => Err(CurveError::PiiConfigMismatch(
            "a [pii] config section is present but no PII schema was supplied via with_pii_schema",
        )),
        (Some(schema), Some(pii_cfg)) => {
            let key_bytes = hex::decode(&pii_cfg.key_hex)?;
            let (key_provider, dek_cache): (Arc<dyn KeyProvider>, Option<Arc<DekCache>>) = match pii_cfg.key_mode {
                KeyMode::Static => (Arc::new(StaticKeyProvider::new(&key_bytes)?), None),
                KeyMode::Envelope => {
                    let len = key_bytes.len();
                    let master_key: [u8; 32] = key_bytes
                        .try_into()
                        .map_err(|_| CurveError::Key(curve_pii::KeyProviderError::InvalidStaticKeyLength(len)))?;
                    let cache = DekCache::new(
                        StdDuration::from_secs(pii_cfg.dek_cache_ttl_secs),
                        pii_cfg.dek_cache_capacity,
                    );
                    (Arc::new(LocalEnvelopeKeyProvider::new(master_key)), Some(Arc::new(cache)))
                }
            };
            let transformer = PiiTransformer::new(schema, pii_cfg.hash_salt.as_bytes().to_vec(), key_provider, dek_cache);
            Ok(Some(Arc::new(transformer)))
        }
    }
}
