//! Scenario 1: assemble an `ORDER_CREATED` envelope, stage it in an
//! in-memory outbox, and run one publisher iteration against a stub
//! broker that just logs what it would have sent.

use std::sync::Arc;

use async_trait::async_trait;
use curve::prelude::*;
use curve::{
    ClockBackwardsMode, CodecKind, CodecSection, DispatchSection, OutboxSection, PublisherSection, RetrySection,
    SourceSection,
};
use curve_dispatch::BrokerSendError;
use curve_outbox_memory::MemoryOutboxStore;
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
struct OrderCreated {
    order_id: String,
    total_cents: u64,
}

/// Logs every send and always succeeds; stands in for a real broker client
/// (Kafka, Pulsar, ...) which would own its own connection pool.
struct StdoutBroker;

#[async_trait]
impl BrokerClient for StdoutBroker {
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerSendError> {
        info!(topic, key, bytes = payload.len(), "broker: would publish");
        Ok(())
    }
}

fn demo_config() -> CurveConfig {
    let backup_dir = std::env::temp_dir().join("curve-basic-publish-demo");

    CurveConfig {
        worker_id: 1,
        epoch_ms: curve_ids::DEFAULT_EPOCH_MS,
        clock_backwards: ClockBackwardsMode::WaitAndRetry,
        is_production: false,
        source: SourceSection {
            service_name: Some("orders-service".to_string()),
            service_version: Some("0.1.0".to_string()),
            instance_id: None,
            host: None,
        },
        codec: CodecSection { kind: CodecKind::Json, schema_registry_url: None },
        pii: None,
        dispatch: DispatchSection {
            main_topic: "orders.events".to_string(),
            dlq_topic: "orders.events.dlq".to_string(),
            backup_dir: backup_dir.to_string_lossy().into_owned(),
            send_timeout_ms: 5_000,
            retry: RetrySection { max_attempts: 5, initial_interval_ms: 100, multiplier: 2.0, max_interval_ms: 10_000 },
            s3_enabled: false,
            s3_bucket: None,
            s3_prefix: None,
        },
        outbox: OutboxSection::default(),
        publisher: PublisherSection {
            poll_interval_ms: 500,
            base_batch_size: 50,
            dynamic_batching: true,
            retry: RetrySection { max_attempts: 10, initial_interval_ms: 500, multiplier: 2.0, max_interval_ms: 60_000 },
            circuit_open_duration_ms: 60_000,
            cleanup_interval_ms: 3_600_000,
            retention_days: 7,
            shutdown_grace_period_ms: 5_000,
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let store = Arc::new(MemoryOutboxStore::new());
    let curve = CurveBuilder::<OrderCreated, MemoryOutboxStore>::new(demo_config())
        .with_broker(Arc::new(StdoutBroker))
        .with_store(store.clone())
        .build()?;

    let event_id = curve
        .record(
            OrderCreated { order_id: "order-42".to_string(), total_cents: 1_999 },
            "ORDER_CREATED",
            Severity::Info,
            "order",
            "order-42",
        )
        .await?;
    info!(event_id, "staged envelope in the outbox");

    let leased = curve.publisher().run_iteration().await?;
    info!(leased, "publisher iteration complete");

    Ok(())
}
