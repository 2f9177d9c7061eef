//! Seller-dashboard read models and projection handlers.
//!
//! Each handler materializes the event payload into a local read-model
//! row. Rows are keyed by the upstream natural id (order id, payment's
//! order id, product id, user id), so a duplicate delivery upserts the
//! same row instead of inserting a second copy.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use broker::{BrokerError, EventHandler, HandlerError, MessageBroker};
use chrono::{DateTime, Utc};
use common::{
    Event, Money, OrderId, ProductId, UserId,
    events::{
        PaymentInitiatedData, ProductCreatedData, SellerOrderCreatedData, UserRegisteredData,
    },
    topics,
};
use serde::Serialize;
use tokio::sync::RwLock;

/// Dashboard copy of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRow {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub item_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Dashboard copy of an initiated payment, keyed by its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRow {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub amount: Money,
}

/// Dashboard copy of a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRow {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub title: String,
    pub price: Money,
}

/// Dashboard copy of a registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
}

/// The seller dashboard's denormalized read models.
///
/// Rebuilt from events, never from the source stores.
#[derive(Default)]
pub struct SellerDashboard {
    orders: RwLock<HashMap<OrderId, OrderRow>>,
    payments: RwLock<HashMap<OrderId, PaymentRow>>,
    products: RwLock<HashMap<ProductId, ProductRow>>,
    users: RwLock<HashMap<UserId, UserRow>>,
}

impl SellerDashboard {
    /// Creates an empty dashboard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Upserts an order row.
    pub async fn upsert_order(&self, row: OrderRow) {
        self.orders.write().await.insert(row.order_id, row);
        metrics::counter!("projections_rows_upserted", "model" => "orders").increment(1);
    }

    /// Upserts a payment row.
    pub async fn upsert_payment(&self, row: PaymentRow) {
        self.payments.write().await.insert(row.order_id, row);
        metrics::counter!("projections_rows_upserted", "model" => "payments").increment(1);
    }

    /// Upserts a product row.
    pub async fn upsert_product(&self, row: ProductRow) {
        self.products.write().await.insert(row.product_id, row);
        metrics::counter!("projections_rows_upserted", "model" => "products").increment(1);
    }

    /// Upserts a user row.
    pub async fn upsert_user(&self, row: UserRow) {
        self.users.write().await.insert(row.user_id, row);
        metrics::counter!("projections_rows_upserted", "model" => "users").increment(1);
    }

    /// All projected orders, newest first.
    pub async fn orders(&self) -> Vec<OrderRow> {
        let mut rows: Vec<OrderRow> = self.orders.read().await.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    /// All projected payments.
    pub async fn payments(&self) -> Vec<PaymentRow> {
        self.payments.read().await.values().cloned().collect()
    }

    /// Products projected for one seller.
    pub async fn products_for_seller(&self, seller_id: UserId) -> Vec<ProductRow> {
        self.products
            .read()
            .await
            .values()
            .filter(|p| p.seller_id == seller_id)
            .cloned()
            .collect()
    }

    /// Number of projected orders.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Number of projected users.
    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

/// Projects `SELLER_ORDER_CREATED` into [`OrderRow`]s.
pub struct OrderProjectionHandler {
    dashboard: Arc<SellerDashboard>,
}

impl OrderProjectionHandler {
    pub fn new(dashboard: Arc<SellerDashboard>) -> Self {
        Self { dashboard }
    }
}

#[async_trait]
impl EventHandler for OrderProjectionHandler {
    fn name(&self) -> &'static str {
        "dashboard-orders"
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let data: SellerOrderCreatedData = event.data_as()?;
        self.dashboard
            .upsert_order(OrderRow {
                order_id: data.order_id,
                user_id: data.user_id,
                total: data.total,
                item_count: data.item_count,
                created_at: data.created_at,
            })
            .await;
        Ok(())
    }
}

/// Projects `SELLER_PAYMENT_INITIATED` into [`PaymentRow`]s.
pub struct PaymentProjectionHandler {
    dashboard: Arc<SellerDashboard>,
}

impl PaymentProjectionHandler {
    pub fn new(dashboard: Arc<SellerDashboard>) -> Self {
        Self { dashboard }
    }
}

#[async_trait]
impl EventHandler for PaymentProjectionHandler {
    fn name(&self) -> &'static str {
        "dashboard-payments"
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let data: PaymentInitiatedData = event.data_as()?;
        self.dashboard
            .upsert_payment(PaymentRow {
                order_id: data.order_id,
                user_id: data.user_id,
                amount: data.amount,
            })
            .await;
        Ok(())
    }
}

/// Projects `SELLER_PRODUCT_CREATED` into [`ProductRow`]s.
pub struct ProductProjectionHandler {
    dashboard: Arc<SellerDashboard>,
}

impl ProductProjectionHandler {
    pub fn new(dashboard: Arc<SellerDashboard>) -> Self {
        Self { dashboard }
    }
}

#[async_trait]
impl EventHandler for ProductProjectionHandler {
    fn name(&self) -> &'static str {
        "dashboard-products"
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let data: ProductCreatedData = event.data_as()?;
        self.dashboard
            .upsert_product(ProductRow {
                product_id: data.product_id,
                seller_id: data.seller_id,
                title: data.title,
                price: data.price,
            })
            .await;
        Ok(())
    }
}

/// Projects `SELLER_USER_REGISTERED` into [`UserRow`]s.
pub struct UserProjectionHandler {
    dashboard: Arc<SellerDashboard>,
}

impl UserProjectionHandler {
    pub fn new(dashboard: Arc<SellerDashboard>) -> Self {
        Self { dashboard }
    }
}

#[async_trait]
impl EventHandler for UserProjectionHandler {
    fn name(&self) -> &'static str {
        "dashboard-users"
    }

    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        let data: UserRegisteredData = event.data_as()?;
        self.dashboard
            .upsert_user(UserRow {
                user_id: data.user_id,
                email: data.email,
                username: data.username,
            })
            .await;
        Ok(())
    }
}

/// Subscribes every dashboard projection handler to its topic.
pub async fn register_dashboard_handlers(
    broker: &dyn MessageBroker,
    dashboard: Arc<SellerDashboard>,
) -> Result<(), BrokerError> {
    broker
        .subscribe(
            topics::SELLER_ORDER_CREATED,
            Arc::new(OrderProjectionHandler::new(dashboard.clone())),
        )
        .await?;
    broker
        .subscribe(
            topics::SELLER_PAYMENT_INITIATED,
            Arc::new(PaymentProjectionHandler::new(dashboard.clone())),
        )
        .await?;
    broker
        .subscribe(
            topics::SELLER_PRODUCT_CREATED,
            Arc::new(ProductProjectionHandler::new(dashboard.clone())),
        )
        .await?;
    broker
        .subscribe(
            topics::SELLER_USER_REGISTERED,
            Arc::new(UserProjectionHandler::new(dashboard)),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use broker::InMemoryBroker;
    use common::Currency;

    fn order_event(order_id: OrderId) -> Event {
        Event::new(
            topics::SELLER_ORDER_CREATED,
            &SellerOrderCreatedData {
                order_id,
                user_id: UserId::new(),
                total: Money::new(70000, Currency::Inr),
                item_count: 2,
                created_at: Utc::now(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn order_projection_materializes_rows() {
        let dashboard = Arc::new(SellerDashboard::new());
        let handler = OrderProjectionHandler::new(dashboard.clone());

        let order_id = OrderId::new();
        handler.handle(order_event(order_id)).await.unwrap();

        let orders = dashboard.orders().await;
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, order_id);
        assert_eq!(orders[0].total.amount(), 70000);
    }

    #[tokio::test]
    async fn duplicate_delivery_upserts_one_row() {
        let dashboard = Arc::new(SellerDashboard::new());
        let handler = OrderProjectionHandler::new(dashboard.clone());

        let event = order_event(OrderId::new());
        handler.handle(event.clone()).await.unwrap();
        handler.handle(event).await.unwrap();

        assert_eq!(dashboard.order_count().await, 1);
    }

    #[tokio::test]
    async fn product_rows_are_seller_scoped() {
        let dashboard = Arc::new(SellerDashboard::new());
        let handler = ProductProjectionHandler::new(dashboard.clone());
        let seller = UserId::new();

        let product = |seller_id: UserId| {
            Event::new(
                topics::SELLER_PRODUCT_CREATED,
                &ProductCreatedData {
                    product_id: ProductId::new(),
                    seller_id,
                    title: "Widget".to_string(),
                    price: Money::new(10000, Currency::Inr),
                },
            )
            .unwrap()
        };

        handler.handle(product(seller)).await.unwrap();
        handler.handle(product(seller)).await.unwrap();
        handler.handle(product(UserId::new())).await.unwrap();

        assert_eq!(dashboard.products_for_seller(seller).await.len(), 2);
        assert_eq!(dashboard.products_for_seller(UserId::new()).await.len(), 0);
    }

    #[tokio::test]
    async fn malformed_payload_is_a_handler_error() {
        let dashboard = Arc::new(SellerDashboard::new());
        let handler = UserProjectionHandler::new(dashboard);
        let bogus = Event::new(
            topics::SELLER_USER_REGISTERED,
            &serde_json::json!({"nope": 1}),
        )
        .unwrap();
        assert!(handler.handle(bogus).await.is_err());
    }

    #[tokio::test]
    async fn end_to_end_projection_through_broker() {
        let broker = InMemoryBroker::new();
        let dashboard = Arc::new(SellerDashboard::new());
        register_dashboard_handlers(&broker, dashboard.clone())
            .await
            .unwrap();

        let event = order_event(OrderId::new());
        broker
            .publish(topics::SELLER_ORDER_CREATED, &event)
            .await
            .unwrap();
        // At-least-once redelivery of the same envelope.
        broker
            .publish(topics::SELLER_ORDER_CREATED, &event)
            .await
            .unwrap();
        broker.dispatch_pending().await;

        assert_eq!(dashboard.order_count().await, 1);
    }

    #[tokio::test]
    async fn user_projection_upserts_by_user_id() {
        let dashboard = Arc::new(SellerDashboard::new());
        let handler = UserProjectionHandler::new(dashboard.clone());
        let user_id = UserId::new();

        let event = Event::new(
            topics::SELLER_USER_REGISTERED,
            &UserRegisteredData {
                user_id,
                email: "jo@example.com".to_string(),
                username: "jo".to_string(),
            },
        )
        .unwrap();

        handler.handle(event.clone()).await.unwrap();
        handler.handle(event).await.unwrap();
        assert_eq!(dashboard.user_count().await, 1);
    }
}
