//! Payment orchestration service.

use std::sync::Arc;

use broker::MessageBroker;
use common::{
    Actor, Event, OrderId, UserId,
    events::{PaymentFailedData, PaymentInitiatedData, PaymentSuccessData},
    topics,
};
use serde::{Deserialize, Serialize};

use crate::error::PaymentError;
use crate::gateway::PaymentGateway;
use crate::model::{FailureReason, Payment, PaymentIntent};
use crate::ports::OrderDirectory;
use crate::signature;
use crate::store::PaymentStore;

/// The three callback fields the gateway posts back after checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

impl VerificationRequest {
    fn has_all_fields(&self) -> bool {
        !self.razorpay_order_id.is_empty()
            && !self.razorpay_payment_id.is_empty()
            && !self.razorpay_signature.is_empty()
    }
}

/// Service for creating and verifying payments.
pub struct PaymentService<G, S, O>
where
    G: PaymentGateway,
    S: PaymentStore,
    O: OrderDirectory,
{
    gateway: G,
    store: S,
    orders: O,
    broker: Arc<dyn MessageBroker>,
    key_secret: String,
}

impl<G, S, O> PaymentService<G, S, O>
where
    G: PaymentGateway,
    S: PaymentStore,
    O: OrderDirectory,
{
    /// Creates a new payment service.
    ///
    /// `key_secret` is the gateway merchant secret used to verify callback
    /// signatures.
    pub fn new(
        gateway: G,
        store: S,
        orders: O,
        broker: Arc<dyn MessageBroker>,
        key_secret: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            store,
            orders,
            broker,
            key_secret: key_secret.into(),
        }
    }

    /// Creates a gateway intent and a pending payment for an order.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn create_payment(
        &self,
        actor: &Actor,
        order_id: OrderId,
    ) -> Result<PaymentIntent, PaymentError> {
        let summary = self
            .orders
            .find_order(order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound { order_id })?;

        if summary.user_id != actor.user_id {
            return Err(PaymentError::Forbidden);
        }
        if !summary.is_checkout_ready() {
            return Err(PaymentError::NotCheckoutReady {
                order_id,
                status: summary.status,
            });
        }

        let razorpay_order = self
            .gateway
            .create_order(summary.total, &format!("ord_{order_id}"))
            .await?;

        let payment = Payment::pending(order_id, actor.user_id, &razorpay_order.id, summary.total);
        self.store.insert(&payment).await?;
        metrics::counter!("payments_initiated_total").increment(1);
        tracing::info!(payment_id = %payment.id, %order_id, "payment intent created");

        let initiated = PaymentInitiatedData {
            user_id: actor.user_id,
            email: actor.email.clone(),
            username: actor.username.clone(),
            order_id,
            amount: payment.amount,
        };
        self.publish_best_effort(topics::PAYMENT_INITIATED, &initiated)
            .await;
        self.publish_best_effort(topics::SELLER_PAYMENT_INITIATED, &initiated)
            .await;

        Ok(PaymentIntent {
            razorpay_order,
            payment,
        })
    }

    /// Verifies a gateway callback and settles the payment.
    ///
    /// The pipeline short-circuits at the first failure. From the
    /// signature check onward every failure is persisted (`FAILED` +
    /// reason) and a `PAYMENT_FAILED` event is published before the error
    /// is surfaced, so the outcome is durable even if the response never
    /// reaches the client.
    #[tracing::instrument(skip(self, request), fields(user_id = %actor.user_id))]
    pub async fn verify_payment(
        &self,
        actor: &Actor,
        request: &VerificationRequest,
    ) -> Result<Payment, PaymentError> {
        // 1. Field presence.
        if !request.has_all_fields() {
            return Err(PaymentError::MissingFields);
        }

        // 2. Load the pending payment. A terminal payment under the same
        // gateway order means a concurrent or earlier verification already
        // settled it; an unknown id is a true miss.
        let payment = match self
            .store
            .find_pending_by_gateway_order(&request.razorpay_order_id)
            .await?
        {
            Some(payment) => payment,
            None => {
                return Err(
                    match self
                        .store
                        .find_by_gateway_order(&request.razorpay_order_id)
                        .await?
                    {
                        Some(_) => PaymentError::AlreadyProcessed,
                        None => PaymentError::NotFound {
                            razorpay_order_id: request.razorpay_order_id.clone(),
                        },
                    },
                );
            }
        };

        // 3. Ownership.
        if payment.user_id != actor.user_id {
            return Err(PaymentError::Forbidden);
        }

        // 4. Callback signature.
        if !signature::verify(
            &request.razorpay_order_id,
            &request.razorpay_payment_id,
            &request.razorpay_signature,
            &self.key_secret,
        ) {
            return Err(self
                .record_failure(&payment, actor, FailureReason::InvalidSignature)
                .await);
        }

        // 5. The gateway is the source of truth for capture, not the
        // client callback.
        let gateway_payment = match self
            .gateway
            .fetch_payment(&request.razorpay_payment_id)
            .await?
        {
            Some(p) if p.status.is_captured() => p,
            _ => {
                return Err(self
                    .record_failure(&payment, actor, FailureReason::NotCaptured)
                    .await);
            }
        };

        // 6. Amount and currency cross-check.
        if gateway_payment.amount != payment.amount.amount()
            || gateway_payment.currency != payment.amount.currency()
        {
            return Err(self
                .record_failure(&payment, actor, FailureReason::AmountMismatch)
                .await);
        }

        // 7. Compare-and-swap to COMPLETED. Zero rows means another
        // verification won the race.
        let completed = self
            .store
            .complete_if_pending(
                payment.id,
                &request.razorpay_payment_id,
                &request.razorpay_signature,
            )
            .await?
            .ok_or(PaymentError::AlreadyProcessed)?;

        metrics::counter!("payments_completed_total").increment(1);
        tracing::info!(
            payment_id = %completed.id,
            order_id = %completed.order_id,
            amount = %completed.amount,
            "payment verified and captured"
        );

        // 8. Settlement event — the trigger for invoicing and the
        // dashboard projection.
        self.publish_best_effort(
            topics::PAYMENT_SUCCESS,
            &PaymentSuccessData {
                user_id: completed.user_id,
                email: actor.email.clone(),
                username: actor.username.clone(),
                order_id: completed.order_id,
                payment_id: request.razorpay_payment_id.clone(),
                amount: completed.amount,
            },
        )
        .await;

        Ok(completed)
    }

    /// Loads the payment for an order, owner-checked.
    #[tracing::instrument(skip(self))]
    pub async fn payment_for_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<Payment, PaymentError> {
        let payment = self
            .store
            .find_by_order(order_id)
            .await?
            .ok_or(PaymentError::NoPaymentForOrder { order_id })?;
        if payment.user_id != user_id {
            return Err(PaymentError::Forbidden);
        }
        Ok(payment)
    }

    /// Lists a user's payments, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn payments_for_user(&self, user_id: UserId) -> Result<Vec<Payment>, PaymentError> {
        self.store.list_for_user(user_id).await
    }

    /// Persists the failure and publishes `PAYMENT_FAILED`, then returns
    /// the error to surface.
    ///
    /// If the CAS sees zero rows a concurrent verification already drove
    /// the payment terminal, so neither the write nor the event happens
    /// twice.
    async fn record_failure(
        &self,
        payment: &Payment,
        actor: &Actor,
        reason: FailureReason,
    ) -> PaymentError {
        match self.store.fail_if_pending(payment.id, reason).await {
            Ok(Some(_)) => {
                metrics::counter!("payments_failed_total", "reason" => reason.as_str())
                    .increment(1);
                tracing::warn!(
                    payment_id = %payment.id,
                    order_id = %payment.order_id,
                    %reason,
                    "payment verification failed"
                );
                self.publish_best_effort(
                    topics::PAYMENT_FAILED,
                    &PaymentFailedData {
                        user_id: payment.user_id,
                        email: actor.email.clone(),
                        username: actor.username.clone(),
                        order_id: payment.order_id,
                        reason: reason.as_str().to_string(),
                    },
                )
                .await;
                PaymentError::Verification { reason }
            }
            Ok(None) => PaymentError::AlreadyProcessed,
            Err(err) => err,
        }
    }

    async fn publish_best_effort<T: Serialize>(&self, queue: &str, data: &T) {
        match Event::new(queue, data) {
            Ok(event) => {
                if let Err(err) = self.broker.publish(queue, &event).await {
                    tracing::warn!(%queue, error = %err, "event publish failed");
                }
            }
            Err(err) => {
                tracing::warn!(%queue, error = %err, "event payload serialization failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{CaptureStatus, GatewayPayment, InMemoryGateway};
    use crate::model::PaymentStatus;
    use crate::ports::{InMemoryOrderDirectory, OrderSummary};
    use crate::store::InMemoryPaymentStore;
    use broker::InMemoryBroker;
    use common::{Currency, Money};

    const SECRET: &str = "test_key_secret";

    type TestService = PaymentService<InMemoryGateway, InMemoryPaymentStore, InMemoryOrderDirectory>;

    fn setup() -> (
        TestService,
        InMemoryGateway,
        InMemoryPaymentStore,
        InMemoryOrderDirectory,
        InMemoryBroker,
    ) {
        let gateway = InMemoryGateway::new();
        let store = InMemoryPaymentStore::new();
        let directory = InMemoryOrderDirectory::new();
        let broker = InMemoryBroker::new();

        let service = PaymentService::new(
            gateway.clone(),
            store.clone(),
            directory.clone(),
            Arc::new(broker.clone()),
            SECRET,
        );
        (service, gateway, store, directory, broker)
    }

    fn actor() -> Actor {
        Actor::new(UserId::new(), "jo@example.com", "jo")
    }

    fn pending_order(directory: &InMemoryOrderDirectory, actor: &Actor, amount: i64) -> OrderId {
        let order_id = OrderId::new();
        directory.insert(OrderSummary {
            order_id,
            user_id: actor.user_id,
            total: Money::new(amount, Currency::Inr),
            status: "PENDING".to_string(),
        });
        order_id
    }

    /// Runs checkout and returns the intent plus a valid callback for it.
    async fn checkout(
        service: &TestService,
        gateway: &InMemoryGateway,
        directory: &InMemoryOrderDirectory,
        actor: &Actor,
        amount: i64,
    ) -> (PaymentIntent, VerificationRequest) {
        let order_id = pending_order(directory, actor, amount);
        let intent = service.create_payment(actor, order_id).await.unwrap();

        let gateway_payment_id = "pay_000001";
        gateway.register_captured(
            gateway_payment_id,
            &intent.razorpay_order.id,
            Money::new(amount, Currency::Inr),
        );

        let request = VerificationRequest {
            razorpay_order_id: intent.razorpay_order.id.clone(),
            razorpay_payment_id: gateway_payment_id.to_string(),
            razorpay_signature: signature::sign(
                &intent.razorpay_order.id,
                gateway_payment_id,
                SECRET,
            )
            .unwrap(),
        };
        (intent, request)
    }

    #[tokio::test]
    async fn create_payment_persists_pending_and_publishes() {
        let (service, _, store, directory, broker) = setup();
        let actor = actor();
        let order_id = pending_order(&directory, &actor, 70000);

        let intent = service.create_payment(&actor, order_id).await.unwrap();

        assert_eq!(intent.payment.status, PaymentStatus::Pending);
        assert_eq!(intent.payment.amount.amount(), 70000);
        assert_eq!(intent.razorpay_order.amount, 70000);
        assert_eq!(intent.payment.razorpay_order_id, intent.razorpay_order.id);
        assert_eq!(store.payment_count().await, 1);

        assert_eq!(broker.pending_count(topics::PAYMENT_INITIATED).await, 1);
        assert_eq!(
            broker.pending_count(topics::SELLER_PAYMENT_INITIATED).await,
            1
        );
        let events = broker.pending_events(topics::PAYMENT_INITIATED).await;
        let data: PaymentInitiatedData = events[0].data_as().unwrap();
        assert_eq!(data.order_id, order_id);
        assert_eq!(data.email, actor.email);
    }

    #[tokio::test]
    async fn create_payment_unknown_order_is_not_found() {
        let (service, _, _, _, _) = setup();
        let err = service
            .create_payment(&actor(), OrderId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::OrderNotFound { .. }));
    }

    #[tokio::test]
    async fn create_payment_for_foreign_order_is_forbidden() {
        let (service, _, _, directory, _) = setup();
        let owner = actor();
        let order_id = pending_order(&directory, &owner, 70000);

        let stranger = Actor::new(UserId::new(), "mallory@example.com", "mallory");
        let err = service
            .create_payment(&stranger, order_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Forbidden));
    }

    #[tokio::test]
    async fn create_payment_requires_checkout_ready_order() {
        let (service, _, store, directory, _) = setup();
        let actor = actor();
        let order_id = OrderId::new();
        directory.insert(OrderSummary {
            order_id,
            user_id: actor.user_id,
            total: Money::new(70000, Currency::Inr),
            status: "CANCELLED".to_string(),
        });

        let err = service.create_payment(&actor, order_id).await.unwrap_err();
        assert!(matches!(err, PaymentError::NotCheckoutReady { .. }));
        assert_eq!(store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn gateway_decline_persists_nothing() {
        let (service, gateway, store, directory, broker) = setup();
        let actor = actor();
        let order_id = pending_order(&directory, &actor, 70000);
        gateway.set_fail_on_create(true);

        let err = service.create_payment(&actor, order_id).await.unwrap_err();
        assert!(matches!(err, PaymentError::Gateway(_)));
        assert_eq!(store.payment_count().await, 0);
        assert_eq!(broker.pending_count(topics::PAYMENT_INITIATED).await, 0);
    }

    #[tokio::test]
    async fn valid_callback_settles_the_payment() {
        let (service, gateway, store, directory, broker) = setup();
        let actor = actor();
        let (intent, request) = checkout(&service, &gateway, &directory, &actor, 70000).await;

        let completed = service.verify_payment(&actor, &request).await.unwrap();

        assert_eq!(completed.status, PaymentStatus::Completed);
        assert_eq!(completed.payment_id.as_deref(), Some("pay_000001"));
        assert_eq!(
            completed.signature.as_deref(),
            Some(request.razorpay_signature.as_str())
        );

        let stored = store.get(intent.payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);

        let events = broker.pending_events(topics::PAYMENT_SUCCESS).await;
        assert_eq!(events.len(), 1);
        let data: PaymentSuccessData = events[0].data_as().unwrap();
        assert_eq!(data.order_id, completed.order_id);
        assert_eq!(data.payment_id, "pay_000001");
        assert_eq!(data.amount.amount(), 70000);
    }

    #[tokio::test]
    async fn replay_returns_conflict_and_never_double_publishes() {
        let (service, gateway, _, directory, broker) = setup();
        let actor = actor();
        let (_, request) = checkout(&service, &gateway, &directory, &actor, 70000).await;

        service.verify_payment(&actor, &request).await.unwrap();
        let err = service.verify_payment(&actor, &request).await.unwrap_err();

        assert!(matches!(err, PaymentError::AlreadyProcessed));
        assert_eq!(broker.pending_count(topics::PAYMENT_SUCCESS).await, 1);
    }

    #[tokio::test]
    async fn missing_fields_short_circuit() {
        let (service, _, _, _, _) = setup();
        let request = VerificationRequest {
            razorpay_order_id: "order_000001".to_string(),
            razorpay_payment_id: String::new(),
            razorpay_signature: "sig".to_string(),
        };
        let err = service.verify_payment(&actor(), &request).await.unwrap_err();
        assert!(matches!(err, PaymentError::MissingFields));
    }

    #[tokio::test]
    async fn unknown_gateway_order_is_not_found() {
        let (service, _, _, _, _) = setup();
        let request = VerificationRequest {
            razorpay_order_id: "order_999999".to_string(),
            razorpay_payment_id: "pay_1".to_string(),
            razorpay_signature: "sig".to_string(),
        };
        let err = service.verify_payment(&actor(), &request).await.unwrap_err();
        assert!(matches!(err, PaymentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn foreign_payment_is_forbidden_and_stays_pending() {
        let (service, gateway, store, directory, _) = setup();
        let owner = actor();
        let (intent, request) = checkout(&service, &gateway, &directory, &owner, 70000).await;

        let stranger = Actor::new(UserId::new(), "mallory@example.com", "mallory");
        let err = service
            .verify_payment(&stranger, &request)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Forbidden));
        let stored = store.get(intent.payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn tampered_signature_fails_and_is_persisted() {
        let (service, gateway, store, directory, broker) = setup();
        let actor = actor();
        let (intent, mut request) = checkout(&service, &gateway, &directory, &actor, 70000).await;

        // Single-bit flip in the signature.
        let mut bytes = hex::decode(&request.razorpay_signature).unwrap();
        bytes[0] ^= 0x01;
        request.razorpay_signature = hex::encode(bytes);

        let err = service.verify_payment(&actor, &request).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Verification {
                reason: FailureReason::InvalidSignature
            }
        ));

        let stored = store.get(intent.payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert_eq!(
            stored.failure_reason,
            Some(FailureReason::InvalidSignature)
        );

        let events = broker.pending_events(topics::PAYMENT_FAILED).await;
        assert_eq!(events.len(), 1);
        let data: PaymentFailedData = events[0].data_as().unwrap();
        assert_eq!(data.reason, "INVALID_SIGNATURE");
        assert_eq!(broker.pending_count(topics::PAYMENT_SUCCESS).await, 0);
    }

    #[tokio::test]
    async fn uncaptured_payment_fails_verification() {
        let (service, gateway, store, directory, _) = setup();
        let actor = actor();
        let order_id = pending_order(&directory, &actor, 70000);
        let intent = service.create_payment(&actor, order_id).await.unwrap();

        // Authorized but never captured.
        gateway.register_payment(GatewayPayment {
            id: "pay_1".to_string(),
            order_id: intent.razorpay_order.id.clone(),
            status: CaptureStatus::Authorized,
            amount: 70000,
            currency: Currency::Inr,
        });

        let request = VerificationRequest {
            razorpay_order_id: intent.razorpay_order.id.clone(),
            razorpay_payment_id: "pay_1".to_string(),
            razorpay_signature: signature::sign(&intent.razorpay_order.id, "pay_1", SECRET)
                .unwrap(),
        };

        let err = service.verify_payment(&actor, &request).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Verification {
                reason: FailureReason::NotCaptured
            }
        ));
        let stored = store.get(intent.payment.id).await.unwrap().unwrap();
        assert_eq!(stored.failure_reason, Some(FailureReason::NotCaptured));
    }

    #[tokio::test]
    async fn unknown_gateway_payment_counts_as_not_captured() {
        let (service, _, _, directory, _) = setup();
        let actor = actor();
        let order_id = pending_order(&directory, &actor, 70000);
        let intent = service.create_payment(&actor, order_id).await.unwrap();

        let request = VerificationRequest {
            razorpay_order_id: intent.razorpay_order.id.clone(),
            razorpay_payment_id: "pay_ghost".to_string(),
            razorpay_signature: signature::sign(&intent.razorpay_order.id, "pay_ghost", SECRET)
                .unwrap(),
        };

        let err = service.verify_payment(&actor, &request).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Verification {
                reason: FailureReason::NotCaptured
            }
        ));
    }

    #[tokio::test]
    async fn amount_mismatch_fails_verification() {
        let (service, gateway, store, directory, _) = setup();
        let actor = actor();
        let order_id = pending_order(&directory, &actor, 700);
        let intent = service.create_payment(&actor, order_id).await.unwrap();

        // Gateway captured 650 against a 700 payment.
        gateway.register_captured(
            "pay_1",
            &intent.razorpay_order.id,
            Money::new(650, Currency::Inr),
        );

        let request = VerificationRequest {
            razorpay_order_id: intent.razorpay_order.id.clone(),
            razorpay_payment_id: "pay_1".to_string(),
            razorpay_signature: signature::sign(&intent.razorpay_order.id, "pay_1", SECRET)
                .unwrap(),
        };

        let err = service.verify_payment(&actor, &request).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Verification {
                reason: FailureReason::AmountMismatch
            }
        ));
        let stored = store.get(intent.payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert_eq!(stored.failure_reason, Some(FailureReason::AmountMismatch));
    }

    #[tokio::test]
    async fn currency_mismatch_fails_even_with_equal_amounts() {
        let (service, gateway, _, directory, _) = setup();
        let actor = actor();
        let order_id = pending_order(&directory, &actor, 700);
        let intent = service.create_payment(&actor, order_id).await.unwrap();

        gateway.register_captured(
            "pay_1",
            &intent.razorpay_order.id,
            Money::new(700, Currency::Usd),
        );

        let request = VerificationRequest {
            razorpay_order_id: intent.razorpay_order.id.clone(),
            razorpay_payment_id: "pay_1".to_string(),
            razorpay_signature: signature::sign(&intent.razorpay_order.id, "pay_1", SECRET)
                .unwrap(),
        };

        let err = service.verify_payment(&actor, &request).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Verification {
                reason: FailureReason::AmountMismatch
            }
        ));
    }

    #[tokio::test]
    async fn payment_views_are_owner_scoped() {
        let (service, gateway, _, directory, _) = setup();
        let actor = actor();
        let (intent, request) = checkout(&service, &gateway, &directory, &actor, 70000).await;
        service.verify_payment(&actor, &request).await.unwrap();

        let by_order = service
            .payment_for_order(actor.user_id, intent.payment.order_id)
            .await
            .unwrap();
        assert_eq!(by_order.id, intent.payment.id);

        let err = service
            .payment_for_order(UserId::new(), intent.payment.order_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Forbidden));

        let mine = service.payments_for_user(actor.user_id).await.unwrap();
        assert_eq!(mine.len(), 1);
    }
}
