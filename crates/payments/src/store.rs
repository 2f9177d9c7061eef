//! Payment persistence with compare-and-swap terminal transitions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, PaymentId, UserId};
use tokio::sync::RwLock;

use crate::error::PaymentError;
use crate::model::{FailureReason, Payment, PaymentStatus};

/// Core trait for payment persistence.
///
/// `complete_if_pending` and `fail_if_pending` are conditional updates on
/// `status = PENDING`: they return `None` when zero rows matched, which
/// means a concurrent verification already drove the payment to a terminal
/// state. Callers treat `None` as already-processed, never as an error to
/// retry.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Persists a new pending payment.
    async fn insert(&self, payment: &Payment) -> Result<(), PaymentError>;

    /// Loads a payment by id.
    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>, PaymentError>;

    /// Loads the pending payment created under a gateway order id.
    async fn find_pending_by_gateway_order(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Payment>, PaymentError>;

    /// Loads the payment created under a gateway order id, any status.
    ///
    /// Distinguishes an already-settled payment (conflict) from one the
    /// system never issued (not found).
    async fn find_by_gateway_order(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Payment>, PaymentError>;

    /// Atomically transitions `PENDING → COMPLETED`, appending the gateway
    /// payment id and signature. `None` if the payment was not pending.
    async fn complete_if_pending(
        &self,
        payment_id: PaymentId,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<Option<Payment>, PaymentError>;

    /// Atomically transitions `PENDING → FAILED`, recording the reason.
    /// `None` if the payment was not pending.
    async fn fail_if_pending(
        &self,
        payment_id: PaymentId,
        reason: FailureReason,
    ) -> Result<Option<Payment>, PaymentError>;

    /// Loads the most recent payment for an order.
    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Payment>, PaymentError>;

    /// Lists a user's payments, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Payment>, PaymentError>;
}

#[async_trait]
impl<T: PaymentStore + ?Sized> PaymentStore for Arc<T> {
    async fn insert(&self, payment: &Payment) -> Result<(), PaymentError> {
        (**self).insert(payment).await
    }

    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>, PaymentError> {
        (**self).get(payment_id).await
    }

    async fn find_pending_by_gateway_order(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        (**self)
            .find_pending_by_gateway_order(razorpay_order_id)
            .await
    }

    async fn find_by_gateway_order(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        (**self).find_by_gateway_order(razorpay_order_id).await
    }

    async fn complete_if_pending(
        &self,
        payment_id: PaymentId,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        (**self)
            .complete_if_pending(payment_id, gateway_payment_id, signature)
            .await
    }

    async fn fail_if_pending(
        &self,
        payment_id: PaymentId,
        reason: FailureReason,
    ) -> Result<Option<Payment>, PaymentError> {
        (**self).fail_if_pending(payment_id, reason).await
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Payment>, PaymentError> {
        (**self).find_by_order(order_id).await
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Payment>, PaymentError> {
        (**self).list_for_user(user_id).await
    }
}

/// In-memory payment store for testing and single-process wiring.
#[derive(Clone, Default)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
}

impl InMemoryPaymentStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of payment records.
    pub async fn payment_count(&self) -> usize {
        self.payments.read().await.len()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: &Payment) -> Result<(), PaymentError> {
        self.payments
            .write()
            .await
            .insert(payment.id, payment.clone());
        Ok(())
    }

    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>, PaymentError> {
        Ok(self.payments.read().await.get(&payment_id).cloned())
    }

    async fn find_pending_by_gateway_order(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| {
                p.razorpay_order_id == razorpay_order_id && p.status == PaymentStatus::Pending
            })
            .cloned())
    }

    async fn find_by_gateway_order(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| p.razorpay_order_id == razorpay_order_id)
            .cloned())
    }

    async fn complete_if_pending(
        &self,
        payment_id: PaymentId,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        let mut payments = self.payments.write().await;
        match payments.get_mut(&payment_id) {
            Some(payment) if payment.status == PaymentStatus::Pending => {
                payment.status = PaymentStatus::Completed;
                payment.payment_id = Some(gateway_payment_id.to_string());
                payment.signature = Some(signature.to_string());
                Ok(Some(payment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn fail_if_pending(
        &self,
        payment_id: PaymentId,
        reason: FailureReason,
    ) -> Result<Option<Payment>, PaymentError> {
        let mut payments = self.payments.write().await;
        match payments.get_mut(&payment_id) {
            Some(payment) if payment.status == PaymentStatus::Pending => {
                payment.status = PaymentStatus::Failed;
                payment.failure_reason = Some(reason);
                Ok(Some(payment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Payment>, PaymentError> {
        let payments = self.payments.read().await;
        let mut for_order: Vec<&Payment> =
            payments.values().filter(|p| p.order_id == order_id).collect();
        for_order.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(for_order.first().map(|p| (*p).clone()))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Payment>, PaymentError> {
        let payments = self.payments.read().await;
        let mut mine: Vec<Payment> = payments
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine)
    }
}
