//! Payment error types.

use common::OrderId;
use thiserror::Error;

use crate::model::FailureReason;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// One of the verification fields is absent.
    #[error("missing verification fields")]
    MissingFields,

    /// No pending payment matches the gateway order id — it is either
    /// unknown or already processed.
    #[error("no pending payment for gateway order {razorpay_order_id}")]
    NotFound { razorpay_order_id: String },

    /// The order a payment was requested for does not exist.
    #[error("order {order_id} not found")]
    OrderNotFound { order_id: OrderId },

    /// No payment exists for the order.
    #[error("no payment found for order {order_id}")]
    NoPaymentForOrder { order_id: OrderId },

    /// The payment or order belongs to a different user.
    #[error("payment does not belong to the requesting user")]
    Forbidden,

    /// The order is not in a checkout-ready state.
    #[error("order {order_id} is not ready for checkout (status {status})")]
    NotCheckoutReady { order_id: OrderId, status: String },

    /// Verification failed; the reason has been persisted on the payment.
    #[error("payment verification failed: {reason}")]
    Verification { reason: FailureReason },

    /// A concurrent verification already settled this payment.
    #[error("payment already processed")]
    AlreadyProcessed,

    /// The gateway rejected a request.
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// A dependent service could not be reached.
    #[error("upstream service unavailable: {service}: {reason}")]
    Upstream {
        service: &'static str,
        reason: String,
    },

    /// A storage operation failed.
    #[error("storage error: {0}")]
    Store(String),

    /// A payload could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<sqlx::Error> for PaymentError {
    fn from(err: sqlx::Error) -> Self {
        PaymentError::Store(err.to_string())
    }
}
