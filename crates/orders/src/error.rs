//! Order error types.

use common::{Currency, OrderId, ProductId};
use thiserror::Error;

use crate::model::OrderStatus;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The shipping address is missing a required field.
    #[error("shipping address is incomplete: missing {field}")]
    InvalidAddress { field: &'static str },

    /// The user's cart has no items.
    #[error("cart is empty")]
    EmptyCart,

    /// A cart item references a product the catalog does not know.
    #[error("product {product_id} not found")]
    ProductNotFound { product_id: ProductId },

    /// Requested quantity exceeds the product's available stock.
    #[error(
        "insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Cart items price in different currencies.
    #[error("currency mismatch within order: expected {expected}, found {found}")]
    CurrencyMismatch { expected: Currency, found: Currency },

    /// No such order.
    #[error("order {order_id} not found")]
    NotFound { order_id: OrderId },

    /// The order belongs to a different user.
    #[error("order {order_id} does not belong to the requesting user")]
    Forbidden { order_id: OrderId },

    /// The order's status does not permit the operation.
    #[error("order {order_id} cannot be {action} in status {status}")]
    InvalidState {
        order_id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },

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

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        OrderError::Store(err.to_string())
    }
}
