//! Outbox publisher loop: leases rows, dispatches them, and reschedules or
//! fails them based on the outcome (§4.5).

use std::sync::Arc;

use chrono::Utc;
use curve_dispatch::Dispatcher;
use curve_outbox_core::{OutboxError, OutboxStore};
use curve_retry::CircuitBreaker;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PublisherConfig;

/// Polls an [`OutboxStore`], dispatches leased rows through a
/// [`Dispatcher`], and applies the retry/fail decision to each outcome.
pub struct Publisher<S: OutboxStore> {
    store: Arc<S>,
    dispatcher: Arc<Dispatcher>,
    circuit_breaker: CircuitBreaker,
    config: PublisherConfig,
}

impl<S: OutboxStore + 'static> Publisher<S> {
    /// Construct a publisher over `store`, dispatching through `dispatcher`.
    pub fn new(store: Arc<S>, dispatcher: Arc<Dispatcher>, config: PublisherConfig) -> Self {
        let circuit_breaker = CircuitBreaker::new(config.circuit_open_duration);
        Self { store, dispatcher, circuit_breaker, config }
    }

    /// Current circuit breaker state, for diagnostics and tests.
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    /// Run a single poll iteration. Returns the number of rows leased (zero
    /// if the circuit breaker short-circuited the iteration or nothing was
    /// eligible).
    pub async fn run_iteration(&self) -> Result<usize, OutboxError> {
        let now = Utc::now();

        if !self.circuit_breaker.allow(now) {
            debug!("circuit breaker OPEN, skipping poll iteration");
            return Ok(0);
        }

        let pending = self.store.count_pending(now).await?;
        let batch_size = self.config.batch_size_for(pending);
        let rows = self.store.lease_batch(batch_size, now).await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let mut published_ids = Vec::with_capacity(rows.len());
        for row in &rows {
            match self.dispatcher.publish(row.id, &row.payload_bytes).await {
                Ok(()) => {
                    self.circuit_breaker.record_success();
                    published_ids.push(row.id);
                }
                Err(dispatch_error) => {
                    self.circuit_breaker.record_failure(now);
                    let message = dispatch_error.to_string();

                    if self.config.retry_policy.should_fail(row.retry_count) {
                        warn!(event_id = row.id, retry_count = row.retry_count, error = %message, "outbox row exhausted retry budget, marking FAILED");
                        self.store.mark_failed(row.id, &message).await?;
                    } else {
                        let next_retry_at = now + self.config.retry_policy.delay_for(row.retry_count);
                        self.store.mark_retry(row.id, next_retry_at, &message).await?;
                    }
                }
            }
        }

        if !published_ids.is_empty() {
            self.store.mark_published(&published_ids, now).await?;
        }

        Ok(rows.len())
    }

    /// Run one cleanup pass: delete PUBLISHED rows older than the
    /// configured retention window.
    pub async fn run_cleanup(&self) -> Result<u64, OutboxError> {
        let cutoff = Utc::now() - self.config.retention;
        self.store.delete_published_older_than(cutoff).await
    }
}

/// Handle to the background poll and cleanup tasks started by
/// [`spawn`]. Dropping it without calling `shutdown` leaves the tasks
/// running; `shutdown` is the cooperative, graceful path.
pub struct PublisherHandle {
    shutdown_tx: watch::Sender<bool>,
    poll_task: JoinHandle<()>,
    cleanup_task: JoinHandle<()>,
    grace_period: std::time::Duration,
}

impl PublisherHandle {
    /// Signal both background tasks to stop, then wait up to the
    /// configured grace period for in-flight iterations to finish before
    /// forcibly aborting them (§5 Cancellation).
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);

        let poll_abort = self.poll_task.abort_handle();
        let cleanup_abort = self.cleanup_task.abort_handle();
        let grace_period = self.grace_period;

        let drained = tokio::time::timeout(grace_period, async {
            let _ = self.poll_task.await;
            let _ = self.cleanup_task.await;
        })
        .await;

        if drained.is_err() {
            warn!("publisher background tasks did not stop within the shutdown grace period, aborting");
            poll_abort.abort();
            cleanup_abort.abort();
        }
    }
}

/// Start the poll loop and the scheduled cleanup task for `publisher`,
/// returning a handle that can later be used for graceful shutdown.
pub fn spawn<S: OutboxStore + 'static>(publisher: Arc<Publisher<S>>) -> PublisherHandle {
    let (shutdown_tx, mut poll_shutdown_rx) = watch::channel(false);
    let mut cleanup_shutdown_rx = poll_shutdown_rx.clone();

    let poll_publisher = Arc::clone(&publisher);
    let poll_interval = publisher.config.poll_interval;
    let poll_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *poll_shutdown_rx.borrow() {
                        break;
                    }
                    if let Err(error) = poll_publisher.run_iteration().await {
                        error!(%error, "outbox publisher iteration failed");
                    }
                }
                _ = poll_shutdown_rx.changed() => {
                    if *poll_shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("outbox publisher poll loop stopped");
    });

    let cleanup_publisher = Arc::clone(&publisher);
    let cleanup_interval = publisher.config.cleanup_interval;
    let cleanup_task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cleanup_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if *cleanup_shutdown_rx.borrow() {
                        break;
                    }
                    match cleanup_publisher.run_cleanup().await {
                        Ok(deleted) if deleted > 0 => info!(deleted, "cleaned up published outbox rows"),
                        Ok(_) => {}
                        Err(error) => error!(%error, "outbox cleanup pass failed"),
                    }
                }
                _ = cleanup_shutdown_rx.changed() => {
                    if *cleanup_shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
        info!("outbox cleanup loop stopped");
    });

    PublisherHandle { shutdown_tx, poll_task, cleanup_task, grace_period: publisher.config.shutdown_grace_period }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use curve_dispatch::{BrokerClient, BrokerSendError, DispatchConfig, NoopStamper};
    use curve_outbox_core::OutboxRecord;
    use curve_outbox_memory::MemoryOutboxStore;
    use curve_retry::RetryPolicy;

    use super::*;

    struct AlwaysFailsBroker {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl BrokerClient for AlwaysFailsBroker {
        async fn send(&self, topic: &str, _key: &str, _payload: &[u8]) -> Result<(), BrokerSendError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(BrokerSendError::Rejected { topic: topic.to_string(), message: "down".into() })
        }
    }

    struct AlwaysSucceedsBroker;

    #[async_trait]
    impl BrokerClient for AlwaysSucceedsBroker {
        async fn send(&self, _topic: &str, _key: &str, _payload: &[u8]) -> Result<(), BrokerSendError> {
            Ok(())
        }
    }

    fn config() -> PublisherConfig {
        PublisherConfig {
            poll_interval: std::time::Duration::from_millis(10),
            base_batch_size: 10,
            dynamic_batching: false,
            retry_policy: RetryPolicy::new(3, chrono::Duration::milliseconds(1), 2.0, chrono::Duration::milliseconds(5)).unwrap(),
            circuit_open_duration: chrono::Duration::seconds(60),
            cleanup_interval: std::time::Duration::from_secs(3600),
            retention: chrono::Duration::days(7),
            shutdown_grace_period: std::time::Duration::from_secs(1),
        }
    }

    fn dispatch_config(dir: std::path::PathBuf) -> DispatchConfig {
        DispatchConfig {
            main_topic: "orders".into(),
            dlq_topic: "orders.dlq".into(),
            backup_dir: dir,
            send_timeout: std::time::Duration::from_millis(200),
            retry_policy: RetryPolicy::new(1, chrono::Duration::milliseconds(1), 1.0, chrono::Duration::milliseconds(1)).unwrap(),
            is_production: false,
        }
    }

    #[tokio::test]
    async fn successful_dispatch_marks_row_published() {
        let store = Arc::new(MemoryOutboxStore::new());
        let now = Utc::now();
        store.save(OutboxRecord::new(1, "order", "o-1", "ORDER_CREATED", vec![1, 2, 3], vec![], now)).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(AlwaysSucceedsBroker), Arc::new(NoopStamper), dispatch_config(dir.path().to_path_buf())));
        let publisher = Publisher::new(store.clone(), dispatcher, config());

        let leased = publisher.run_iteration().await.unwrap();
        assert_eq!(leased, 1);
        assert_eq!(store.count_pending(now).await.unwrap(), 0);
        assert_eq!(publisher.circuit_breaker().consecutive_failures(), 0);
    }

    #[tokio::test]
    async fn repeated_dispatch_failures_open_the_circuit_breaker() {
        let store = Arc::new(MemoryOutboxStore::new());
        let now = Utc::now();
        for id in 1..=5u64 {
            store.save(OutboxRecord::new(id, "order", "o-1", "ORDER_CREATED", vec![], vec![], now)).await.unwrap();
        }

        // A backup "directory" that is actually a plain file makes every
        // tier fail: the main send fails, the DLQ send fails, and the
        // backup write's create_dir_all fails because its parent isn't a
        // directory. That gives the circuit breaker five real failures.
        let dir = tempfile::tempdir().unwrap();
        let blocked_path = dir.path().join("not-a-directory");
        std::fs::write(&blocked_path, b"occupied").unwrap();
        let unwritable_backup_dir = blocked_path.join("backups");
        let broker = Arc::new(AlwaysFailsBroker { attempts: AtomicUsize::new(0) });
        let mut dispatch_cfg = dispatch_config(unwritable_backup_dir);
        dispatch_cfg.retry_policy = RetryPolicy::new(1, chrono::Duration::milliseconds(1), 1.0, chrono::Duration::milliseconds(1)).unwrap();
        let dispatcher = Arc::new(Dispatcher::new(broker, Arc::new(NoopStamper), dispatch_cfg));

        let mut publisher_cfg = config();
        publisher_cfg.retry_policy = RetryPolicy::new(1, chrono::Duration::milliseconds(1), 1.0, chrono::Duration::milliseconds(1)).unwrap();
        let publisher = Publisher::new(store.clone(), dispatcher, publisher_cfg);

        publisher.run_iteration().await.unwrap();

        assert_eq!(publisher.circuit_breaker().state(), curve_retry::CircuitState::Open);
        assert_eq!(store.count_pending(now).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn cleanup_deletes_old_published_rows() {
        let store = Arc::new(MemoryOutboxStore::new());
        let now = Utc::now();
        store.save(OutboxRecord::new(1, "order", "o-1", "ORDER_CREATED", vec![], vec![], now)).await.unwrap();
        store.lease_batch(10, now).await.unwrap();
        store.mark_published(&[1], now - chrono::Duration::days(30)).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(AlwaysSucceedsBroker), Arc::new(NoopStamper), dispatch_config(dir.path().to_path_buf())));
        let publisher = Publisher::new(store.clone(), dispatcher, config());

        let deleted = publisher.run_cleanup().await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn spawn_and_graceful_shutdown_stops_background_tasks() {
        let store = Arc::new(MemoryOutboxStore::new());
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(AlwaysSucceedsBroker), Arc::new(NoopStamper), dispatch_config(dir.path().to_path_buf())));
        let publisher = Arc::new(Publisher::new(store, dispatcher, config()));

        let handle = spawn(publisher);
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        handle.shutdown().await;
    }
}
