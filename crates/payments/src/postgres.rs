//! PostgreSQL-backed payment store.
//!
//! The terminal transitions are single conditional UPDATEs on
//! `status = 'PENDING'`, so concurrent verifications race safely: exactly
//! one sees its row.

use async_trait::async_trait;
use common::{Currency, Money, OrderId, PaymentId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::PaymentError;
use crate::model::{FailureReason, Payment, PaymentStatus};
use crate::store::PaymentStore;

/// PostgreSQL payment store.
#[derive(Clone)]
pub struct PostgresPaymentStore {
    pool: PgPool,
}

const PAYMENT_COLUMNS: &str = "id, order_id, user_id, razorpay_order_id, payment_id, signature, \
                               status, amount, currency, failure_reason, created_at";

impl PostgresPaymentStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the payments table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), PaymentError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS payments (
                id UUID PRIMARY KEY,
                order_id UUID NOT NULL,
                user_id UUID NOT NULL,
                razorpay_order_id TEXT NOT NULL,
                payment_id TEXT,
                signature TEXT,
                status TEXT NOT NULL,
                amount BIGINT NOT NULL,
                currency TEXT NOT NULL,
                failure_reason TEXT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS payments_gateway_order_idx ON payments (razorpay_order_id)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_payment(row: PgRow) -> Result<Payment, PaymentError> {
        let status_label: String = row.try_get("status")?;
        let status = PaymentStatus::parse(&status_label)
            .ok_or_else(|| PaymentError::Store(format!("unknown payment status {status_label}")))?;

        let currency_code: String = row.try_get("currency")?;
        let currency = Currency::parse(&currency_code)
            .ok_or_else(|| PaymentError::Store(format!("unknown currency {currency_code}")))?;

        let failure_label: Option<String> = row.try_get("failure_reason")?;
        let failure_reason = match failure_label {
            Some(label) => Some(FailureReason::parse(&label).ok_or_else(|| {
                PaymentError::Store(format!("unknown failure reason {label}"))
            })?),
            None => None,
        };

        Ok(Payment {
            id: PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            order_id: OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            razorpay_order_id: row.try_get("razorpay_order_id")?,
            payment_id: row.try_get("payment_id")?,
            signature: row.try_get("signature")?,
            status,
            amount: Money::new(row.try_get("amount")?, currency),
            failure_reason,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn insert(&self, payment: &Payment) -> Result<(), PaymentError> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, order_id, user_id, razorpay_order_id, payment_id, signature,
                                  status, amount, currency, failure_reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.order_id.as_uuid())
        .bind(payment.user_id.as_uuid())
        .bind(&payment.razorpay_order_id)
        .bind(&payment.payment_id)
        .bind(&payment.signature)
        .bind(payment.status.as_str())
        .bind(payment.amount.amount())
        .bind(payment.amount.currency().as_str())
        .bind(payment.failure_reason.map(|r| r.as_str()))
        .bind(payment.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, payment_id: PaymentId) -> Result<Option<Payment>, PaymentError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(payment_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_pending_by_gateway_order(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE razorpay_order_id = $1 AND status = 'PENDING'"
        ))
        .bind(razorpay_order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_gateway_order(
        &self,
        razorpay_order_id: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE razorpay_order_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(razorpay_order_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn complete_if_pending(
        &self,
        payment_id: PaymentId,
        gateway_payment_id: &str,
        signature: &str,
    ) -> Result<Option<Payment>, PaymentError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = 'COMPLETED', payment_id = $2, signature = $3
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id.as_uuid())
        .bind(gateway_payment_id)
        .bind(signature)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn fail_if_pending(
        &self,
        payment_id: PaymentId,
        reason: FailureReason,
    ) -> Result<Option<Payment>, PaymentError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE payments
            SET status = 'FAILED', failure_reason = $2
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(payment_id.as_uuid())
        .bind(reason.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Payment>, PaymentError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_payment).transpose()
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Payment>, PaymentError> {
        let rows = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_payment).collect()
    }
}
