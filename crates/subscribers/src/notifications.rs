//! Notification handlers, one per topic.
//!
//! Every handler dedupes on the event's natural key before touching the
//! mailer, so a redelivered event never produces a second email. A failed
//! send leaves the key unmarked and returns an error, which requeues the
//! message for another attempt.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use broker::{BrokerError, EventHandler, HandlerError, MessageBroker};
use common::{
    Event, Money,
    events::{
        OrderCancelledData, PaymentFailedData, PaymentSuccessData, UserLoginData,
        UserRegisteredData,
    },
    topics,
};

use crate::email::{Email, EmailSender};

/// Natural-key dedupe guard shared by the notification handlers.
#[derive(Debug, Default)]
struct ProcessedKeys {
    keys: RwLock<HashSet<String>>,
}

impl ProcessedKeys {
    fn already_processed(&self, key: &str) -> bool {
        self.keys.read().unwrap().contains(key)
    }

    fn mark_processed(&self, key: String) {
        self.keys.write().unwrap().insert(key);
    }
}

fn format_amount(amount: Money) -> String {
    let minor = amount.amount();
    format!("{}.{:02} {}", minor / 100, (minor % 100).abs(), amount.currency())
}

/// Sends the welcome email on `USER_REGISTERED`.
pub struct WelcomeEmailHandler {
    mailer: Arc<dyn EmailSender>,
    processed: ProcessedKeys,
}

impl WelcomeEmailHandler {
    pub fn new(mailer: Arc<dyn EmailSender>) -> Self {
        Self {
            mailer,
            processed: ProcessedKeys::default(),
        }
    }
}

#[async_trait]
impl EventHandler for WelcomeEmailHandler {
    fn name(&self) -> &'static str {
        "welcome-email"
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let data: UserRegisteredData = event.data_as()?;
        let key = data.user_id.to_string();
        if self.processed.already_processed(&key) {
            metrics::counter!("notifications_duplicates_skipped").increment(1);
            return Ok(());
        }

        self.mailer
            .send(Email {
                to: data.email.clone(),
                subject: format!("Welcome {}!", data.username),
                body: format!(
                    "Hi {}, your account has been created successfully.",
                    data.username
                ),
            })
            .await
            .map_err(HandlerError::from)?;

        self.processed.mark_processed(key);
        metrics::counter!("notifications_emails_sent").increment(1);
        Ok(())
    }
}

/// Logs login events on `USER_LOGIN`.
///
/// Audit-log only; logging a redelivered event twice is harmless, so no
/// dedupe state is kept.
pub struct LoginAuditHandler;

#[async_trait]
impl EventHandler for LoginAuditHandler {
    fn name(&self) -> &'static str {
        "login-audit"
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let data: UserLoginData = event.data_as()?;
        tracing::info!(user_id = %data.user_id, ip = %data.ip, "user logged in");
        Ok(())
    }
}

/// Sends the receipt email on `PAYMENT_SUCCESS`.
pub struct PaymentSuccessEmailHandler {
    mailer: Arc<dyn EmailSender>,
    processed: ProcessedKeys,
}

impl PaymentSuccessEmailHandler {
    pub fn new(mailer: Arc<dyn EmailSender>) -> Self {
        Self {
            mailer,
            processed: ProcessedKeys::default(),
        }
    }
}

#[async_trait]
impl EventHandler for PaymentSuccessEmailHandler {
    fn name(&self) -> &'static str {
        "payment-success-email"
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let data: PaymentSuccessData = event.data_as()?;
        let key = data.payment_id.clone();
        if self.processed.already_processed(&key) {
            metrics::counter!("notifications_duplicates_skipped").increment(1);
            return Ok(());
        }

        self.mailer
            .send(Email {
                to: data.email.clone(),
                subject: "Payment successful".to_string(),
                body: format!(
                    "Your payment of {} for order {} was successful.",
                    format_amount(data.amount),
                    data.order_id
                ),
            })
            .await
            .map_err(HandlerError::from)?;

        self.processed.mark_processed(key);
        metrics::counter!("notifications_emails_sent").increment(1);
        Ok(())
    }
}

/// Sends the failure email on `PAYMENT_FAILED`.
pub struct PaymentFailedEmailHandler {
    mailer: Arc<dyn EmailSender>,
    processed: ProcessedKeys,
}

impl PaymentFailedEmailHandler {
    pub fn new(mailer: Arc<dyn EmailSender>) -> Self {
        Self {
            mailer,
            processed: ProcessedKeys::default(),
        }
    }
}

#[async_trait]
impl EventHandler for PaymentFailedEmailHandler {
    fn name(&self) -> &'static str {
        "payment-failed-email"
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let data: PaymentFailedData = event.data_as()?;
        // Distinct failure reasons on the same order are distinct
        // notifications; a redelivery of the same one is not.
        let key = format!("{}:{}", data.order_id, data.reason);
        if self.processed.already_processed(&key) {
            metrics::counter!("notifications_duplicates_skipped").increment(1);
            return Ok(());
        }

        self.mailer
            .send(Email {
                to: data.email.clone(),
                subject: "Payment failed".to_string(),
                body: format!(
                    "Your payment for order {} failed ({}). You can retry the payment.",
                    data.order_id, data.reason
                ),
            })
            .await
            .map_err(HandlerError::from)?;

        self.processed.mark_processed(key);
        metrics::counter!("notifications_emails_sent").increment(1);
        Ok(())
    }
}

/// Sends the cancellation email on `ORDER_CANCELLED`.
pub struct OrderCancelledEmailHandler {
    mailer: Arc<dyn EmailSender>,
    processed: ProcessedKeys,
}

impl OrderCancelledEmailHandler {
    pub fn new(mailer: Arc<dyn EmailSender>) -> Self {
        Self {
            mailer,
            processed: ProcessedKeys::default(),
        }
    }
}

#[async_trait]
impl EventHandler for OrderCancelledEmailHandler {
    fn name(&self) -> &'static str {
        "order-cancelled-email"
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let data: OrderCancelledData = event.data_as()?;
        let key = data.order_id.to_string();
        if self.processed.already_processed(&key) {
            metrics::counter!("notifications_duplicates_skipped").increment(1);
            return Ok(());
        }

        self.mailer
            .send(Email {
                to: data.email.clone(),
                subject: "Order cancelled".to_string(),
                body: format!(
                    "Your order {} ({}) has been cancelled.",
                    data.order_id,
                    format_amount(data.total)
                ),
            })
            .await
            .map_err(HandlerError::from)?;

        self.processed.mark_processed(key);
        metrics::counter!("notifications_emails_sent").increment(1);
        Ok(())
    }
}

/// Subscribes every notification handler to its topic.
pub async fn register_notification_handlers(
    broker: &dyn MessageBroker,
    mailer: Arc<dyn EmailSender>,
) -> Result<(), BrokerError> {
    broker
        .subscribe(
            topics::USER_REGISTERED,
            Arc::new(WelcomeEmailHandler::new(mailer.clone())),
        )
        .await?;
    broker
        .subscribe(topics::USER_LOGIN, Arc::new(LoginAuditHandler))
        .await?;
    broker
        .subscribe(
            topics::PAYMENT_SUCCESS,
            Arc::new(PaymentSuccessEmailHandler::new(mailer.clone())),
        )
        .await?;
    broker
        .subscribe(
            topics::PAYMENT_FAILED,
            Arc::new(PaymentFailedEmailHandler::new(mailer.clone())),
        )
        .await?;
    broker
        .subscribe(
            topics::ORDER_CANCELLED,
            Arc::new(OrderCancelledEmailHandler::new(mailer)),
        )
        .await?;
    Ok(())
}
