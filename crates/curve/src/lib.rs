#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **curve** – Batteries-included entry point for the event delivery
//! pipeline: envelope assembly, PII transform, transactional outbox, and
//! broker dispatch with three-tier failure recovery.
//!
//! Deployments that want fine-grained control over any one stage (a
//! custom [`curve_assembler::ContextProvider`], a hand-rolled codec, a
//! storage backend other than `curve-outbox-memory`/`curve-outbox-postgres`)
//! should depend on the individual `curve-*` crates directly instead of
//! this facade; this crate fixes one reasonable composition of them.
//!
//! ```no_run
//! use curve::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example(store: Arc<curve_outbox_memory::MemoryOutboxStore>, broker: Arc<dyn BrokerClient>) -> Result<(), CurveError> {
//! let config = CurveConfig::load(Some("curve.toml"))?;
//! let curve = CurveBuilder::<serde_json::Value, _>::new(config)
//!     .with_broker(broker)
//!     .with_store(store)
//!     .build()?;
//!
//! curve.record(serde_json::json!({"order_id": "o-1"}), "ORDER_CREATED", Severity::Info, "order", "o-1").await?;
//! let _handle = curve.spawn_publisher();
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod curve;
mod error;
pub mod prelude;
mod telemetry;

pub use builder::CurveBuilder;
pub use config::{
    ClockBackwardsMode, CodecKind, CodecSection, CurveConfig, DispatchSection, KeyMode, OutboxSection, PiiSection,
    PublisherSection, RetrySection, SourceSection,
};
pub use curve::Curve;
pub use error::CurveError;
pub use telemetry::init_tracing;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use curve_dispatch::{BrokerClient, BrokerSendError};
    use curve_outbox_memory::MemoryOutboxStore;
    use curve_types::Severity;
    use serde::Serialize;

    use crate::{CurveBuilder, CurveConfig};

    #[derive(Debug, Clone, Serialize)]
    struct OrderCreated {
        order_id: String,
    }

    struct RecordingBroker {
        sent: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    #[async_trait]
    impl BrokerClient for RecordingBroker {
        async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerSendError> {
            self.sent.lock().unwrap().push((topic.to_string(), key.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    fn config(backup_dir: PathBuf) -> CurveConfig {
        let toml = format!(
            r#"
            worker_id = 3

            [dispatch]
            main_topic = "orders.events"
            dlq_topic = "orders.events.dlq"
            backup_dir = "{}"
            [dispatch.retry]
            max_attempts = 3
            initial_interval_ms = 10
            multiplier = 2.0
            max_interval_ms = 1000

            [publisher]
            [publisher.retry]
            max_attempts = 5
            initial_interval_ms = 10
            multiplier = 2.0
            max_interval_ms = 1000
            "#,
            backup_dir.display()
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("curve.toml");
        std::fs::write(&path, toml).unwrap();
        CurveConfig::load(Some(path.to_str().unwrap())).unwrap()
    }

    #[tokio::test]
    async fn record_stages_a_row_in_the_outbox() {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(RecordingBroker { sent: Mutex::new(Vec::new()) });
        let store = Arc::new(MemoryOutboxStore::new());

        let curve = CurveBuilder::<OrderCreated, MemoryOutboxStore>::new(config(dir.path().to_path_buf()))
            .with_broker(broker)
            .with_store(store.clone())
            .build()
            .unwrap();

        let event_id = curve
            .record(OrderCreated { order_id: "o-1".to_string() }, "ORDER_CREATED", Severity::Info, "order", "o-1")
            .await
            .unwrap();

        assert!(event_id > 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn publisher_iteration_dispatches_staged_row() {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(RecordingBroker { sent: Mutex::new(Vec::new()) });
        let store = Arc::new(MemoryOutboxStore::new());

        let curve = CurveBuilder::<OrderCreated, MemoryOutboxStore>::new(config(dir.path().to_path_buf()))
            .with_broker(broker.clone())
            .with_store(store.clone())
            .build()
            .unwrap();

        curve
            .record(OrderCreated { order_id: "o-2".to_string() }, "ORDER_CREATED", Severity::Info, "order", "o-2")
            .await
            .unwrap();

        let leased = curve.publisher().run_iteration().await.unwrap();
        assert_eq!(leased, 1);

        let sent = broker.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);

        let codec = curve_codec::JsonCodec::new(None);
        let dispatched: curve_types::EventEnvelope<serde_json::Value> = codec.decode(&sent[0].2).unwrap();
        let published_at = dispatched.published_at.expect("dispatcher must stamp published_at before the broker write");
        assert!(dispatched.occurred_at <= published_at);
    }

    #[test]
    fn missing_broker_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryOutboxStore::new());
        let result = CurveBuilder::<OrderCreated, MemoryOutboxStore>::new(config(dir.path().to_path_buf()))
            .with_store(store)
            .build();
        assert!(matches!(result, Err(crate::CurveError::MissingBroker)));
    }

    #[test]
    fn pii_schema_without_config_section_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(RecordingBroker { sent: Mutex::new(Vec::new()) });
        let store = Arc::new(MemoryOutboxStore::new());
        let schema = curve_types::PiiSchema::builder()
            .field("email", curve_types::PiiType::Email, curve_types::PiiStrategy::Mask)
            .build();

        let result = CurveBuilder::<OrderCreated, MemoryOutboxStore>::new(config(dir.path().to_path_buf()))
            .with_broker(broker)
            .with_store(store)
            .with_pii_schema(schema)
            .build();

        assert!(matches!(result, Err(crate::CurveError::PiiConfigMismatch(_))));
    }
}
