//! PostgreSQL-backed order store.

use async_trait::async_trait;
use common::{Currency, Money, OrderId, UserId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::OrderError;
use crate::model::{Order, OrderStatus};
use crate::store::{OrderStore, Page};

/// PostgreSQL order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the orders table if it does not exist.
    pub async fn ensure_schema(&self) -> Result<(), OrderError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id UUID PRIMARY KEY,
                user_id UUID NOT NULL,
                status TEXT NOT NULL,
                total_amount BIGINT NOT NULL,
                currency TEXT NOT NULL,
                items JSONB NOT NULL,
                shipping_address JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS orders_user_id_idx ON orders (user_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn row_to_order(row: PgRow) -> Result<Order, OrderError> {
        let status_label: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_label)
            .ok_or_else(|| OrderError::Store(format!("unknown order status {status_label}")))?;

        let currency_code: String = row.try_get("currency")?;
        let currency = Currency::parse(&currency_code)
            .ok_or_else(|| OrderError::Store(format!("unknown currency {currency_code}")))?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            items: serde_json::from_value(row.try_get("items")?)?,
            status,
            total: Money::new(row.try_get("total_amount")?, currency),
            shipping_address: serde_json::from_value(row.try_get("shipping_address")?)?,
            created_at: row.try_get("created_at")?,
        })
    }
}

const ORDER_COLUMNS: &str =
    "id, user_id, status, total_amount, currency, items, shipping_address, created_at";

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), OrderError> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, status, total_amount, currency, items, shipping_address, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.total.amount())
        .bind(order.total.currency().as_str())
        .bind(serde_json::to_value(&order.items)?)
        .bind(serde_json::to_value(&order.shipping_address)?)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, OrderError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn update(&self, order: &Order) -> Result<(), OrderError> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, shipping_address = $3 WHERE id = $1",
        )
        .bind(order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(serde_json::to_value(&order.shipping_address)?)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(OrderError::NotFound { order_id: order.id });
        }
        Ok(())
    }

    async fn list_for_user(&self, user_id: UserId, page: Page) -> Result<Vec<Order>, OrderError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC OFFSET $2 LIMIT $3"
        ))
        .bind(user_id.as_uuid())
        .bind(page.offset() as i64)
        .bind(i64::from(page.limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn count_for_user(&self, user_id: UserId) -> Result<u64, OrderError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
