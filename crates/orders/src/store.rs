//! Order persistence trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, UserId};
use tokio::sync::RwLock;

use crate::error::OrderError;
use crate::model::Order;

/// Pagination window for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// 1-based page number.
    pub page: u32,
    /// Maximum rows per page.
    pub limit: u32,
}

impl Page {
    /// Creates a page, clamping degenerate values.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, 100),
        }
    }

    /// Number of rows to skip.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

/// Core trait for order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order. This write is the aggregation commit point.
    async fn insert(&self, order: &Order) -> Result<(), OrderError>;

    /// Loads an order by id.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, OrderError>;

    /// Writes back a mutated order (status, shipping address).
    async fn update(&self, order: &Order) -> Result<(), OrderError>;

    /// Lists a user's orders, newest first.
    async fn list_for_user(&self, user_id: UserId, page: Page) -> Result<Vec<Order>, OrderError>;

    /// Counts a user's orders.
    async fn count_for_user(&self, user_id: UserId) -> Result<u64, OrderError>;
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for Arc<T> {
    async fn insert(&self, order: &Order) -> Result<(), OrderError> {
        (**self).insert(order).await
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, OrderError> {
        (**self).get(order_id).await
    }

    async fn update(&self, order: &Order) -> Result<(), OrderError> {
        (**self).update(order).await
    }

    async fn list_for_user(&self, user_id: UserId, page: Page) -> Result<Vec<Order>, OrderError> {
        (**self).list_for_user(user_id, page).await
    }

    async fn count_for_user(&self, user_id: UserId) -> Result<u64, OrderError> {
        (**self).count_for_user(user_id).await
    }
}

/// In-memory order store for testing and single-process wiring.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of persisted orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<(), OrderError> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>, OrderError> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn update(&self, order: &Order) -> Result<(), OrderError> {
        let mut orders = self.orders.write().await;
        match orders.get_mut(&order.id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => Err(OrderError::NotFound { order_id: order.id }),
        }
    }

    async fn list_for_user(&self, user_id: UserId, page: Page) -> Result<Vec<Order>, OrderError> {
        let orders = self.orders.read().await;
        let mut mine: Vec<Order> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(mine
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn count_for_user(&self, user_id: UserId) -> Result<u64, OrderError> {
        let orders = self.orders.read().await;
        Ok(orders.values().filter(|o| o.user_id == user_id).count() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OrderItem, OrderStatus, ShippingAddress};
    use chrono::Utc;
    use common::{Currency, Money, ProductId};

    fn order_for(user_id: UserId) -> Order {
        Order {
            id: OrderId::new(),
            user_id,
            items: vec![OrderItem::new(
                ProductId::new(),
                1,
                Money::new(10000, Currency::Inr),
            )],
            status: OrderStatus::Pending,
            total: Money::new(10000, Currency::Inr),
            shipping_address: ShippingAddress {
                street: "1 Marine Drive".to_string(),
                city: "Mumbai".to_string(),
                state: "MH".to_string(),
                zip: "400001".to_string(),
                country: "IN".to_string(),
            },
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_get() {
        let store = InMemoryOrderStore::new();
        let order = order_for(UserId::new());
        store.insert(&order).await.unwrap();

        let loaded = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(loaded, order);
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = InMemoryOrderStore::new();
        assert!(store.get(OrderId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_order_fails() {
        let store = InMemoryOrderStore::new();
        let order = order_for(UserId::new());
        let result = store.update(&order).await;
        assert!(matches!(result, Err(OrderError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_is_user_scoped_and_paginated() {
        let store = InMemoryOrderStore::new();
        let user = UserId::new();
        for _ in 0..3 {
            store.insert(&order_for(user)).await.unwrap();
        }
        store.insert(&order_for(UserId::new())).await.unwrap();

        let first_page = store.list_for_user(user, Page::new(1, 2)).await.unwrap();
        assert_eq!(first_page.len(), 2);
        let second_page = store.list_for_user(user, Page::new(2, 2)).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(store.count_for_user(user).await.unwrap(), 3);
    }

    #[test]
    fn page_clamps_degenerate_values() {
        let page = Page::new(0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, 1);
        assert_eq!(Page::new(3, 500).limit, 100);
        assert_eq!(Page::new(3, 10).offset(), 20);
    }
}
