//! Three-tier dispatch orchestration (§4.6): main topic, then DLQ, then a
//! local backup file. Each tier is attempted only after the previous one is
//! exhausted.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use curve_retry::RetryPolicy;
use curve_types::DlqRecord;
use tracing::{info, warn};

use crate::backup::write_backup_file;
use crate::client::BrokerClient;
use crate::error::{BrokerSendError, DispatchError};
use crate::stamp::PayloadStamper;

/// Dispatcher configuration: topics, timeouts, and the local fallback
/// directory.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Topic the main (Tier 1) send targets.
    pub main_topic: String,
    /// Topic the DLQ (Tier 2) send targets.
    pub dlq_topic: String,
    /// Directory Tier 3 backup files are written under.
    pub backup_dir: PathBuf,
    /// Per-send timeout applied to every broker call.
    pub send_timeout: StdDuration,
    /// Retry policy wrapping Tier 1 sends.
    pub retry_policy: RetryPolicy,
    /// Whether this process runs in production. Governs how a Tier 3
    /// permissions failure is treated.
    pub is_production: bool,
}

/// Orchestrates the main-topic / DLQ / local-backup recovery chain for a
/// single broker client.
pub struct Dispatcher {
    broker: Arc<dyn BrokerClient>,
    stamper: Arc<dyn PayloadStamper>,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Construct a dispatcher over `broker` with the given configuration.
    /// `stamper` rewrites `published_at` on `payload` immediately before
    /// the Tier 1 send (§4.1) — it must be the same wire codec that
    /// produced `payload`, since stamping decodes and re-encodes it.
    pub fn new(broker: Arc<dyn BrokerClient>, stamper: Arc<dyn PayloadStamper>, config: DispatchConfig) -> Self {
        Self { broker, stamper, config }
    }

    /// Attempt to deliver `payload` for `event_id`, falling through the
    /// three recovery tiers as each is exhausted. `published_at` is
    /// stamped onto `payload` once, here, before the first send attempt —
    /// every recovery tier (main, DLQ, backup) carries the same stamped
    /// bytes.
    pub async fn publish(&self, event_id: u64, payload: &[u8]) -> Result<(), DispatchError> {
        let key = event_id.to_string();
        let payload = self
            .stamper
            .stamp_published_at(payload, Utc::now())
            .map_err(|source| DispatchError::Stamping { event_id, source })?;
        let payload = payload.as_slice();

        match self.send_with_retry(&self.config.main_topic, &key, payload).await {
            Ok(()) => return Ok(()),
            Err(main_error) => {
                warn!(event_id, topic = %self.config.main_topic, error = %main_error, "main topic send exhausted retries, falling back to DLQ");
                self.publish_to_dlq_or_backup(event_id, &key, payload, main_error).await
            }
        }
    }

    async fn send_with_retry(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerSendError> {
        let mut retry_count = 0u32;
        loop {
            let attempt = tokio::time::timeout(self.config.send_timeout, self.broker.send(topic, key, payload)).await;

            let outcome = match attempt {
                Ok(Ok(())) => return Ok(()),
                Ok(Err(send_error)) => send_error,
                Err(_elapsed) => BrokerSendError::Timeout { topic: topic.to_string() },
            };

            if self.config.retry_policy.should_fail(retry_count) {
                return Err(outcome);
            }

            let delay = self.config.retry_policy.delay_for(retry_count);
            tokio::time::sleep(StdDuration::from_millis(delay.num_milliseconds().max(0) as u64)).await;
            retry_count += 1;
        }
    }

    async fn publish_to_dlq_or_backup(
        &self,
        event_id: u64,
        key: &str,
        original_payload: &[u8],
        main_error: BrokerSendError,
    ) -> Result<(), DispatchError> {
        let dlq_record = DlqRecord::new(
            event_id,
            self.config.main_topic.clone(),
            original_payload.to_vec(),
            exception_type_name(&main_error),
            main_error.to_string(),
            Utc::now(),
        );
        let dlq_bytes = match serde_json::to_vec(&dlq_record) {
            Ok(bytes) => bytes,
            Err(encode_error) => {
                return self
                    .fall_back_to_backup(event_id, dlq_record, DispatchError::BackupAlsoFailed {
                        event_id,
                        backup_error: encode_error.to_string(),
                    })
                    .await
            }
        };

        // A single retry attempt is granted to the DLQ send (§4.6).
        let mut dlq_error = None;
        for _ in 0..2 {
            match self.broker.send(&self.config.dlq_topic, key, &dlq_bytes).await {
                Ok(()) => {
                    info!(event_id, "delivered to DLQ after main topic failure");
                    return Ok(());
                }
                Err(err) => dlq_error = Some(err),
            }
        }

        let dlq_error = dlq_error.expect("loop always runs at least once");
        warn!(event_id, error = %dlq_error, "DLQ send also failed, falling back to local backup file");
        self.fall_back_to_backup(event_id, dlq_record, DispatchError::DlqAlsoFailed { event_id, dlq_error }).await
    }

    async fn fall_back_to_backup(
        &self,
        event_id: u64,
        dlq_record: DlqRecord,
        upstream_error: DispatchError,
    ) -> Result<(), DispatchError> {
        match write_backup_file(&self.config.backup_dir, &dlq_record).await {
            Ok((path, permissions_ok)) => {
                if !permissions_ok {
                    if self.config.is_production {
                        return Err(DispatchError::BackupPermissionsRejected {
                            event_id,
                            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "failed to restrict backup file to owner-only access"),
                        });
                    }
                    warn!(event_id, path = %path.display(), "could not restrict backup file permissions, proceeding outside production mode");
                }
                info!(event_id, path = %path.display(), "wrote local backup file after DLQ failure");
                Ok(())
            }
            Err(io_error) => {
                warn!(event_id, error = %io_error, "local backup write also failed");
                let _ = &upstream_error;
                Err(DispatchError::BackupAlsoFailed { event_id, backup_error: io_error.to_string() })
            }
        }
    }
}

fn exception_type_name(error: &BrokerSendError) -> &'static str {
    match error {
        BrokerSendError::Timeout { .. } => "BrokerSendTimeout",
        BrokerSendError::Rejected { .. } => "BrokerSendRejected",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use curve_retry::RetryPolicy;

    use super::*;
    use crate::stamp::NoopStamper;

    struct RecordingBroker {
        main_failures: AtomicUsize,
        fail_main_times: usize,
        fail_dlq: bool,
        sent: std::sync::Mutex<Vec<(String, String)>>,
    }

    impl RecordingBroker {
        fn new(fail_main_times: usize, fail_dlq: bool) -> Self {
            Self { main_failures: AtomicUsize::new(0), fail_main_times, fail_dlq, sent: std::sync::Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl BrokerClient for RecordingBroker {
        async fn send(&self, topic: &str, key: &str, _payload: &[u8]) -> Result<(), BrokerSendError> {
            self.sent.lock().unwrap().push((topic.to_string(), key.to_string()));

            if topic == "orders.dlq" && self.fail_dlq {
                return Err(BrokerSendError::Rejected { topic: topic.to_string(), message: "dlq down".into() });
            }
            if topic == "orders" {
                let count = self.main_failures.fetch_add(1, Ordering::SeqCst);
                if count < self.fail_main_times {
                    return Err(BrokerSendError::Rejected { topic: topic.to_string(), message: "broker unavailable".into() });
                }
            }
            Ok(())
        }
    }

    fn config(backup_dir: PathBuf) -> DispatchConfig {
        DispatchConfig {
            main_topic: "orders".into(),
            dlq_topic: "orders.dlq".into(),
            backup_dir,
            send_timeout: StdDuration::from_millis(200),
            retry_policy: RetryPolicy::new(3, chrono::Duration::milliseconds(1), 2.0, chrono::Duration::milliseconds(10)).unwrap(),
            is_production: false,
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_main_topic_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(RecordingBroker::new(0, false));
        let dispatcher = Dispatcher::new(broker, Arc::new(NoopStamper), config(dir.path().to_path_buf()));

        dispatcher.publish(1, b"payload").await.unwrap();
    }

    #[tokio::test]
    async fn recovers_after_transient_main_topic_failures() {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(RecordingBroker::new(2, false));
        let dispatcher = Dispatcher::new(broker, Arc::new(NoopStamper), config(dir.path().to_path_buf()));

        dispatcher.publish(2, b"payload").await.unwrap();
    }

    #[tokio::test]
    async fn falls_through_to_dlq_when_main_topic_is_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(RecordingBroker::new(100, false));
        let dispatcher = Dispatcher::new(broker.clone(), Arc::new(NoopStamper), config(dir.path().to_path_buf()));

        dispatcher.publish(3, b"payload").await.unwrap();
        let sent = broker.sent.lock().unwrap();
        assert!(sent.iter().any(|(topic, _)| topic == "orders.dlq"));
    }

    #[tokio::test]
    async fn falls_through_to_local_backup_when_dlq_also_fails() {
        let dir = tempfile::tempdir().unwrap();
        let broker = Arc::new(RecordingBroker::new(100, true));
        let dispatcher = Dispatcher::new(broker, Arc::new(NoopStamper), config(dir.path().to_path_buf()));

        dispatcher.publish(4, b"payload").await.unwrap();

        let backup_path = dir.path().join("4.json");
        assert!(tokio::fs::metadata(&backup_path).await.is_ok());
    }
}
