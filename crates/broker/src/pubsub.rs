//! Core broker trait.

use std::sync::Arc;

use async_trait::async_trait;
use common::Event;

use crate::error::BrokerError;
use crate::handler::EventHandler;

/// Durable publish/subscribe abstraction over a message queue.
///
/// All implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publishes a persistent message to a durable queue.
    ///
    /// The queue is asserted (created if absent) before the write. Publish
    /// is fire-and-forget from the producer's perspective: durability
    /// covers broker-crash survival, not delivery confirmation.
    async fn publish(&self, queue: &str, event: &Event) -> Result<(), BrokerError>;

    /// Registers the consumer for a durable queue.
    ///
    /// Exactly one consumer per queue: a second registration for the same
    /// queue fails with [`BrokerError::ConsumerAlreadyRegistered`] rather
    /// than silently splitting deliveries.
    async fn subscribe(
        &self,
        queue: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), BrokerError>;
}
