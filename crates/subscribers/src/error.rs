//! Subscriber error types.

use broker::HandlerError;
use thiserror::Error;

/// Errors that can occur inside event subscribers.
#[derive(Debug, Error)]
pub enum SubscriberError {
    /// An email could not be delivered.
    #[error("email delivery failed: {0}")]
    Email(String),

    /// An event payload did not match the topic's schema.
    #[error("malformed event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<SubscriberError> for HandlerError {
    fn from(err: SubscriberError) -> Self {
        HandlerError::new(err.to_string())
    }
}
