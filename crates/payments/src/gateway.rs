//! Payment gateway port and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Currency, Money};
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;

/// Gateway-reported lifecycle state of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureStatus {
    /// Created but not yet paid.
    Created,
    /// Funds authorized but not collected.
    Authorized,
    /// Funds collected — the only state that settles an order.
    Captured,
    /// Payment attempt failed.
    Failed,
    /// Funds returned after capture.
    Refunded,
}

impl CaptureStatus {
    /// Returns true if the gateway confirmed funds were collected.
    pub fn is_captured(&self) -> bool {
        matches!(self, CaptureStatus::Captured)
    }
}

/// A gateway-side order, created per checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayOrder {
    /// Gateway order id (e.g. `order_000001`).
    pub id: String,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Currency of the amount.
    pub currency: Currency,
    /// Merchant-side receipt reference.
    pub receipt: String,
}

/// A gateway-side payment object, fetched during verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayPayment {
    /// Gateway payment id.
    pub id: String,
    /// The gateway order this payment was made against.
    pub order_id: String,
    /// Capture status as reported by the gateway.
    pub status: CaptureStatus,
    /// Amount in minor currency units.
    pub amount: i64,
    /// Currency of the amount.
    pub currency: Currency,
}

/// Trait for third-party payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Creates a gateway order (payment intent) for an amount.
    async fn create_order(
        &self,
        amount: Money,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError>;

    /// Fetches a payment object by gateway payment id.
    ///
    /// `None` if the gateway has no such payment.
    async fn fetch_payment(&self, payment_id: &str)
    -> Result<Option<GatewayPayment>, PaymentError>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn create_order(
        &self,
        amount: Money,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        (**self).create_order(amount, receipt).await
    }

    async fn fetch_payment(
        &self,
        payment_id: &str,
    ) -> Result<Option<GatewayPayment>, PaymentError> {
        (**self).fetch_payment(payment_id).await
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    orders: HashMap<String, GatewayOrder>,
    payments: HashMap<String, GatewayPayment>,
    next_order: u32,
    fail_on_create: bool,
}

/// In-memory payment gateway for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to decline order creation.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state.write().unwrap().fail_on_create = fail;
    }

    /// Registers a payment object the gateway will report.
    pub fn register_payment(&self, payment: GatewayPayment) {
        self.state
            .write()
            .unwrap()
            .payments
            .insert(payment.id.clone(), payment);
    }

    /// Registers a captured payment against a gateway order.
    pub fn register_captured(&self, payment_id: &str, order_id: &str, amount: Money) {
        self.register_payment(GatewayPayment {
            id: payment_id.to_string(),
            order_id: order_id.to_string(),
            status: CaptureStatus::Captured,
            amount: amount.amount(),
            currency: amount.currency(),
        });
    }

    /// Number of gateway orders created so far.
    pub fn order_count(&self) -> usize {
        self.state.read().unwrap().orders.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn create_order(
        &self,
        amount: Money,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_create {
            return Err(PaymentError::Gateway("order creation declined".to_string()));
        }

        state.next_order += 1;
        let order = GatewayOrder {
            id: format!("order_{:06}", state.next_order),
            amount: amount.amount(),
            currency: amount.currency(),
            receipt: receipt.to_string(),
        };
        state.orders.insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn fetch_payment(
        &self,
        payment_id: &str,
    ) -> Result<Option<GatewayPayment>, PaymentError> {
        Ok(self.state.read().unwrap().payments.get(payment_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_order_assigns_sequential_ids() {
        let gateway = InMemoryGateway::new();
        let amount = Money::new(70000, Currency::Inr);

        let first = gateway.create_order(amount, "ord_1").await.unwrap();
        let second = gateway.create_order(amount, "ord_2").await.unwrap();

        assert_eq!(first.id, "order_000001");
        assert_eq!(second.id, "order_000002");
        assert_eq!(first.amount, 70000);
        assert_eq!(gateway.order_count(), 2);
    }

    #[tokio::test]
    async fn fail_on_create_declines() {
        let gateway = InMemoryGateway::new();
        gateway.set_fail_on_create(true);

        let result = gateway
            .create_order(Money::new(100, Currency::Inr), "ord")
            .await;
        assert!(matches!(result, Err(PaymentError::Gateway(_))));
        assert_eq!(gateway.order_count(), 0);
    }

    #[tokio::test]
    async fn fetch_payment_misses_return_none() {
        let gateway = InMemoryGateway::new();
        assert!(gateway.fetch_payment("pay_x").await.unwrap().is_none());

        gateway.register_captured("pay_x", "order_000001", Money::new(500, Currency::Inr));
        let payment = gateway.fetch_payment("pay_x").await.unwrap().unwrap();
        assert!(payment.status.is_captured());
        assert_eq!(payment.amount, 500);
    }

    #[test]
    fn capture_status_wire_format_is_lowercase() {
        let status: CaptureStatus = serde_json::from_str("\"captured\"").unwrap();
        assert!(status.is_captured());
        assert!(!CaptureStatus::Authorized.is_captured());
    }
}
