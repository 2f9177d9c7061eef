//! Broker error types.

use thiserror::Error;

/// Errors surfaced by broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The connection is not open.
    #[error("broker connection is not open")]
    NotConnected,

    /// The connection gave up reconnecting.
    #[error("broker connection permanently failed after {attempts} attempts")]
    ConnectionFatal { attempts: u32 },

    /// A consumer is already registered for the queue.
    #[error("a consumer is already registered for queue {queue}")]
    ConsumerAlreadyRegistered { queue: String },

    /// A publish could not be completed.
    #[error("failed to publish to {queue}: {reason}")]
    Publish { queue: String, reason: String },

    /// An event payload could not be serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error returned by an event handler.
///
/// Any handler error triggers a negative acknowledgment and requeue, so
/// the message text is for operators, not for control flow.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Creates a handler error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self(format!("malformed event payload: {err}"))
    }
}
