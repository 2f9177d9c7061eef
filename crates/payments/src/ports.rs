//! Port to the order service, with an in-memory fake.
//!
//! Checkout needs only a thin slice of the order: its owner, total, and
//! whether it is still payable. The orchestrator reads that slice through
//! this port so it never depends on the order service's internals.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Money, OrderId, UserId};

use crate::error::PaymentError;

/// The slice of an order that checkout needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    /// Order status label (`"PENDING"`, `"SHIPPED"`, ...).
    pub status: String,
}

impl OrderSummary {
    /// Returns true if a payment may be initiated against the order.
    pub fn is_checkout_ready(&self) -> bool {
        self.status == "PENDING"
    }
}

/// Read access to orders for checkout eligibility.
#[async_trait]
pub trait OrderDirectory: Send + Sync {
    /// Fetches the checkout slice of an order; `None` if no such order.
    async fn find_order(&self, order_id: OrderId) -> Result<Option<OrderSummary>, PaymentError>;
}

#[async_trait]
impl<T: OrderDirectory + ?Sized> OrderDirectory for Arc<T> {
    async fn find_order(&self, order_id: OrderId) -> Result<Option<OrderSummary>, PaymentError> {
        (**self).find_order(order_id).await
    }
}

/// In-memory order directory for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOrderDirectory {
    orders: Arc<RwLock<HashMap<OrderId, OrderSummary>>>,
}

impl InMemoryOrderDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an order summary.
    pub fn insert(&self, summary: OrderSummary) {
        self.orders
            .write()
            .unwrap()
            .insert(summary.order_id, summary);
    }
}

#[async_trait]
impl OrderDirectory for InMemoryOrderDirectory {
    async fn find_order(&self, order_id: OrderId) -> Result<Option<OrderSummary>, PaymentError> {
        Ok(self.orders.read().unwrap().get(&order_id).cloned())
    }
}
