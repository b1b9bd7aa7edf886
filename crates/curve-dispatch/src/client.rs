//! Broker client seam.

use async_trait::async_trait;

use crate::error::BrokerSendError;

/// Abstraction over the partitioned message broker. Implementations own
/// their own connection pooling and I/O threads; the dispatcher never talks
/// to the wire directly.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Send `payload` to `topic`, partitioned by `key`. Implementations
    /// should route same-key sends to the same partition so that, combined
    /// with a serial publisher, per-aggregate ordering holds.
    async fn send(&self, topic: &str, key: &str, payload: &[u8]) -> Result<(), BrokerSendError>;
}
