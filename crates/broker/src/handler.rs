//! Consumer-side handler trait.

use async_trait::async_trait;
use common::Event;

use crate::error::HandlerError;

/// A consumer of events from one queue.
///
/// Delivery is at-least-once: the same event may be handed to the handler
/// more than once, and `Err` results cause redelivery. Implementations
/// must be idempotent — repeated execution on the same event must produce
/// no additional side effect beyond the first successful one.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// A short name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Processes one event. `Ok` acknowledges the message, `Err` requeues it.
    async fn handle(&self, event: Event) -> Result<(), HandlerError>;
}
