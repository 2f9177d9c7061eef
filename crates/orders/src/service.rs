//! Order aggregation service.

use std::collections::HashMap;
use std::sync::Arc;

use broker::MessageBroker;
use common::{
    Actor, Currency, Event, Money, OrderId, ProductId, UserId,
    events::{OrderCancelledData, SellerOrderCreatedData},
    topics,
};
use futures_util::future::try_join_all;
use serde::Serialize;

use crate::error::OrderError;
use crate::model::{Order, OrderItem, OrderStatus, ShippingAddress};
use crate::ports::{CartReader, ProductReader, ProductSnapshot};
use crate::store::{OrderStore, Page};

/// Service for assembling and managing orders.
///
/// `create_order` is all-or-nothing up to the order write: the cart
/// snapshot, the product snapshots, and the stock checks all happen before
/// anything is persisted, and a single product failure aborts the whole
/// order. The stock check is optimistic — two concurrent orders can both
/// pass it against stale snapshots; checkout re-verifies via the payment
/// eligibility check, and a conditional decrement at commit time is the
/// planned successor.
pub struct OrderService<C, P, S>
where
    C: CartReader,
    P: ProductReader,
    S: OrderStore,
{
    carts: C,
    products: P,
    store: S,
    broker: Arc<dyn MessageBroker>,
}

impl<C, P, S> OrderService<C, P, S>
where
    C: CartReader,
    P: ProductReader,
    S: OrderStore,
{
    /// Creates a new order service.
    pub fn new(carts: C, products: P, store: S, broker: Arc<dyn MessageBroker>) -> Self {
        Self {
            carts,
            products,
            store,
            broker,
        }
    }

    /// Builds an order from the user's cart and persists it `PENDING`.
    ///
    /// The order write is the commit point: once it succeeds the order
    /// exists regardless of what happens next. Clearing the source cart
    /// and publishing the dashboard projection event are best-effort.
    #[tracing::instrument(skip(self, address, token), fields(user_id = %actor.user_id))]
    pub async fn create_order(
        &self,
        actor: &Actor,
        address: ShippingAddress,
        token: &str,
    ) -> Result<Order, OrderError> {
        address.validate()?;

        let cart = self.carts.cart_for_user(actor.user_id, token).await?;
        if cart.items.is_empty() {
            return Err(OrderError::EmptyCart);
        }

        // Fetch every distinct product concurrently; any failure aborts
        // the whole order, so no partial order can be built.
        let mut distinct: Vec<ProductId> = Vec::new();
        for item in &cart.items {
            if !distinct.contains(&item.product_id) {
                distinct.push(item.product_id);
            }
        }
        let fetches = distinct.iter().map(|id| self.products.product(*id, token));
        let snapshots = try_join_all(fetches).await?;

        let mut by_id: HashMap<ProductId, ProductSnapshot> = HashMap::new();
        for snapshot in snapshots.into_iter().flatten() {
            by_id.insert(snapshot.id, snapshot);
        }

        let mut currency: Option<Currency> = None;
        let mut total_amount: i64 = 0;
        let mut items = Vec::with_capacity(cart.items.len());

        for cart_item in &cart.items {
            let product =
                by_id
                    .get(&cart_item.product_id)
                    .ok_or(OrderError::ProductNotFound {
                        product_id: cart_item.product_id,
                    })?;

            if cart_item.quantity > product.stock {
                return Err(OrderError::InsufficientStock {
                    product_id: product.id,
                    requested: cart_item.quantity,
                    available: product.stock,
                });
            }

            let order_currency = *currency.get_or_insert(product.price.currency());
            if product.price.currency() != order_currency {
                return Err(OrderError::CurrencyMismatch {
                    expected: order_currency,
                    found: product.price.currency(),
                });
            }

            let item = OrderItem::new(cart_item.product_id, cart_item.quantity, product.price);
            total_amount += item.total_price.amount();
            items.push(item);
        }

        let currency = currency.unwrap_or_default();
        let order = Order {
            id: OrderId::new(),
            user_id: actor.user_id,
            items,
            status: OrderStatus::Pending,
            total: Money::new(total_amount, currency),
            shipping_address: address,
            created_at: chrono::Utc::now(),
        };

        // Commit point.
        self.store.insert(&order).await?;
        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, total = %order.total, "order created");

        // Best-effort from here on: the order is never rolled back.
        if let Err(err) = self.carts.clear_cart(actor.user_id, token).await {
            tracing::warn!(order_id = %order.id, error = %err, "cart clear failed after order commit");
        }

        self.publish_best_effort(
            topics::SELLER_ORDER_CREATED,
            &SellerOrderCreatedData {
                order_id: order.id,
                user_id: order.user_id,
                total: order.total,
                item_count: order.item_count() as u32,
                created_at: order.created_at,
            },
        )
        .await;

        Ok(order)
    }

    /// Cancels a pending order owned by the actor.
    #[tracing::instrument(skip(self), fields(user_id = %actor.user_id))]
    pub async fn cancel_order(&self, actor: &Actor, order_id: OrderId) -> Result<Order, OrderError> {
        let mut order = self.load_owned(order_id, actor.user_id).await?;

        if !order.status.can_cancel() {
            return Err(OrderError::InvalidState {
                order_id,
                status: order.status,
                action: "cancelled",
            });
        }

        order.status = OrderStatus::Cancelled;
        self.store.update(&order).await?;
        metrics::counter!("orders_cancelled_total").increment(1);
        tracing::info!(%order_id, "order cancelled");

        self.publish_best_effort(
            topics::ORDER_CANCELLED,
            &OrderCancelledData {
                order_id: order.id,
                user_id: order.user_id,
                email: actor.email.clone(),
                username: actor.username.clone(),
                total: order.total,
            },
        )
        .await;

        Ok(order)
    }

    /// Replaces the shipping address of a pending order.
    #[tracing::instrument(skip(self, address), fields(user_id = %actor.user_id))]
    pub async fn update_shipping_address(
        &self,
        actor: &Actor,
        order_id: OrderId,
        address: ShippingAddress,
    ) -> Result<Order, OrderError> {
        address.validate()?;
        let mut order = self.load_owned(order_id, actor.user_id).await?;

        if !order.status.can_update_address() {
            return Err(OrderError::InvalidState {
                order_id,
                status: order.status,
                action: "updated",
            });
        }

        order.shipping_address = address;
        self.store.update(&order).await?;
        Ok(order)
    }

    /// Loads one order, owner-checked.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, user_id: UserId, order_id: OrderId) -> Result<Order, OrderError> {
        self.load_owned(order_id, user_id).await
    }

    /// Lists a user's orders, newest first, with the total count.
    #[tracing::instrument(skip(self))]
    pub async fn orders_for_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> Result<(Vec<Order>, u64), OrderError> {
        let orders = self.store.list_for_user(user_id, page).await?;
        let total = self.store.count_for_user(user_id).await?;
        Ok((orders, total))
    }

    async fn load_owned(&self, order_id: OrderId, user_id: UserId) -> Result<Order, OrderError> {
        let order = self
            .store
            .get(order_id)
            .await?
            .ok_or(OrderError::NotFound { order_id })?;
        if !order.owned_by(user_id) {
            return Err(OrderError::Forbidden { order_id });
        }
        Ok(order)
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
    use crate::model::OrderStatus;
    use crate::ports::{CartItem, InMemoryCartService, InMemoryProductCatalog, ProductSnapshot};
    use crate::store::InMemoryOrderStore;
    use broker::InMemoryBroker;

    type TestService = OrderService<InMemoryCartService, InMemoryProductCatalog, InMemoryOrderStore>;

    fn setup() -> (
        TestService,
        InMemoryCartService,
        InMemoryProductCatalog,
        InMemoryOrderStore,
        InMemoryBroker,
    ) {
        let carts = InMemoryCartService::new();
        let catalog = InMemoryProductCatalog::new();
        let store = InMemoryOrderStore::new();
        let broker = InMemoryBroker::new();

        let service = OrderService::new(
            carts.clone(),
            catalog.clone(),
            store.clone(),
            Arc::new(broker.clone()),
        );
        (service, carts, catalog, store, broker)
    }

    fn actor() -> Actor {
        Actor::new(UserId::new(), "jo@example.com", "jo")
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            street: "1 Marine Drive".to_string(),
            city: "Mumbai".to_string(),
            state: "MH".to_string(),
            zip: "400001".to_string(),
            country: "IN".to_string(),
        }
    }

    fn product(price: i64, stock: u32) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(),
            title: "Widget".to_string(),
            price: Money::new(price, Currency::Inr),
            stock,
            seller_id: UserId::new(),
        }
    }

    fn cart_item(product: &ProductSnapshot, quantity: u32) -> CartItem {
        CartItem {
            product_id: product.id,
            quantity,
        }
    }

    #[tokio::test]
    async fn totals_follow_unit_price_times_quantity() {
        let (service, carts, catalog, _, _) = setup();
        let actor = actor();

        let p1 = product(100, 10);
        let p2 = product(500, 10);
        catalog.insert_product(p1.clone());
        catalog.insert_product(p2.clone());
        carts.set_cart(actor.user_id, vec![cart_item(&p1, 2), cart_item(&p2, 1)]);

        let order = service
            .create_order(&actor, address(), "token")
            .await
            .unwrap();

        assert_eq!(order.total.amount(), 700);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].total_price.amount(), 200);
        assert_eq!(order.items[1].total_price.amount(), 500);
    }

    #[tokio::test]
    async fn insufficient_stock_persists_no_order() {
        let (service, carts, catalog, store, _) = setup();
        let actor = actor();

        let scarce = product(100, 1);
        catalog.insert_product(scarce.clone());
        carts.set_cart(actor.user_id, vec![cart_item(&scarce, 2)]);

        let err = service
            .create_order(&actor, address(), "token")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            OrderError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            }
        ));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let (service, _, _, store, _) = setup();
        let err = service
            .create_order(&actor(), address(), "token")
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::EmptyCart));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn unreachable_cart_service_maps_to_upstream() {
        let (service, carts, _, _, _) = setup();
        carts.set_unavailable(true);

        let err = service
            .create_order(&actor(), address(), "token")
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Upstream { service: "cart", .. }));
    }

    #[tokio::test]
    async fn unknown_product_aborts_the_order() {
        let (service, carts, _, store, _) = setup();
        let actor = actor();
        carts.set_cart(
            actor.user_id,
            vec![CartItem {
                product_id: ProductId::new(),
                quantity: 1,
            }],
        );

        let err = service
            .create_order(&actor, address(), "token")
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::ProductNotFound { .. }));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn product_fetch_failure_aborts_the_order() {
        let (service, carts, catalog, store, _) = setup();
        let actor = actor();

        let p = product(100, 10);
        catalog.insert_product(p.clone());
        carts.set_cart(actor.user_id, vec![cart_item(&p, 1)]);
        catalog.set_unavailable(true);

        let err = service
            .create_order(&actor, address(), "token")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::Upstream {
                service: "products",
                ..
            }
        ));
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn mixed_currencies_are_rejected() {
        let (service, carts, catalog, _, _) = setup();
        let actor = actor();

        let inr = product(100, 10);
        let mut usd = product(500, 10);
        usd.price = Money::new(500, Currency::Usd);
        catalog.insert_product(inr.clone());
        catalog.insert_product(usd.clone());
        carts.set_cart(actor.user_id, vec![cart_item(&inr, 1), cart_item(&usd, 1)]);

        let err = service
            .create_order(&actor, address(), "token")
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::CurrencyMismatch { .. }));
    }

    #[tokio::test]
    async fn cart_is_cleared_after_commit() {
        let (service, carts, catalog, _, _) = setup();
        let actor = actor();

        let p = product(100, 10);
        catalog.insert_product(p.clone());
        carts.set_cart(actor.user_id, vec![cart_item(&p, 1)]);

        service
            .create_order(&actor, address(), "token")
            .await
            .unwrap();
        assert!(carts.cart_contents(actor.user_id).is_empty());
    }

    #[tokio::test]
    async fn cart_clear_failure_does_not_roll_back() {
        let (service, carts, catalog, store, _) = setup();
        let actor = actor();

        let p = product(100, 10);
        catalog.insert_product(p.clone());
        carts.set_cart(actor.user_id, vec![cart_item(&p, 1)]);
        carts.set_fail_on_clear(true);

        let order = service
            .create_order(&actor, address(), "token")
            .await
            .unwrap();

        assert_eq!(store.order_count().await, 1);
        assert!(store.get(order.id).await.unwrap().is_some());
        // The cart still holds its items; the order stands regardless.
        assert_eq!(carts.cart_contents(actor.user_id).len(), 1);
    }

    #[tokio::test]
    async fn order_creation_publishes_dashboard_projection() {
        let (service, carts, catalog, _, broker) = setup();
        let actor = actor();

        let p = product(100, 10);
        catalog.insert_product(p.clone());
        carts.set_cart(actor.user_id, vec![cart_item(&p, 2)]);

        let order = service
            .create_order(&actor, address(), "token")
            .await
            .unwrap();

        let events = broker.pending_events(topics::SELLER_ORDER_CREATED).await;
        assert_eq!(events.len(), 1);
        let data: SellerOrderCreatedData = events[0].data_as().unwrap();
        assert_eq!(data.order_id, order.id);
        assert_eq!(data.total.amount(), 200);
    }

    #[tokio::test]
    async fn incomplete_address_is_rejected_before_any_fetch() {
        let (service, carts, _, _, _) = setup();
        carts.set_unavailable(true);

        let mut bad = address();
        bad.street = String::new();
        let err = service
            .create_order(&actor(), bad, "token")
            .await
            .unwrap_err();
        // Address validation short-circuits before the unavailable cart
        // service is ever touched.
        assert!(matches!(err, OrderError::InvalidAddress { field: "street" }));
    }

    async fn created_order(
        service: &TestService,
        carts: &InMemoryCartService,
        catalog: &InMemoryProductCatalog,
        actor: &Actor,
    ) -> Order {
        let p = product(100, 10);
        catalog.insert_product(p.clone());
        carts.set_cart(actor.user_id, vec![cart_item(&p, 1)]);
        service
            .create_order(actor, address(), "token")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn cancel_transitions_pending_to_cancelled() {
        let (service, carts, catalog, _, broker) = setup();
        let actor = actor();
        let order = created_order(&service, &carts, &catalog, &actor).await;

        let cancelled = service.cancel_order(&actor, order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let events = broker.pending_events(topics::ORDER_CANCELLED).await;
        assert_eq!(events.len(), 1);
        let data: OrderCancelledData = events[0].data_as().unwrap();
        assert_eq!(data.order_id, order.id);
        assert_eq!(data.email, actor.email);
    }

    #[tokio::test]
    async fn cancel_by_non_owner_is_forbidden() {
        let (service, carts, catalog, _, _) = setup();
        let owner = actor();
        let order = created_order(&service, &carts, &catalog, &owner).await;

        let stranger = Actor::new(UserId::new(), "mallory@example.com", "mallory");
        let err = service.cancel_order(&stranger, order.id).await.unwrap_err();
        assert!(matches!(err, OrderError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn cancel_on_shipped_order_conflicts_and_leaves_status() {
        let (service, carts, catalog, store, _) = setup();
        let actor = actor();
        let mut order = created_order(&service, &carts, &catalog, &actor).await;

        order.status = OrderStatus::Shipped;
        store.update(&order).await.unwrap();

        let err = service.cancel_order(&actor, order.id).await.unwrap_err();
        assert!(matches!(
            err,
            OrderError::InvalidState {
                status: OrderStatus::Shipped,
                ..
            }
        ));
        let unchanged = store.get(order.id).await.unwrap().unwrap();
        assert_eq!(unchanged.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn cancel_unknown_order_is_not_found() {
        let (service, _, _, _, _) = setup();
        let err = service
            .cancel_order(&actor(), OrderId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));
    }

    #[tokio::test]
    async fn address_is_mutable_only_while_pending() {
        let (service, carts, catalog, store, _) = setup();
        let actor = actor();
        let order = created_order(&service, &carts, &catalog, &actor).await;

        let mut new_address = address();
        new_address.city = "Pune".to_string();
        let updated = service
            .update_shipping_address(&actor, order.id, new_address.clone())
            .await
            .unwrap();
        assert_eq!(updated.shipping_address.city, "Pune");

        let mut shipped = updated;
        shipped.status = OrderStatus::Shipped;
        store.update(&shipped).await.unwrap();

        let err = service
            .update_shipping_address(&actor, order.id, new_address)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn order_views_are_owner_scoped() {
        let (service, carts, catalog, _, _) = setup();
        let owner = actor();
        let order = created_order(&service, &carts, &catalog, &owner).await;

        let loaded = service.get_order(owner.user_id, order.id).await.unwrap();
        assert_eq!(loaded.id, order.id);

        let err = service
            .get_order(UserId::new(), order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::Forbidden { .. }));

        let (orders, total) = service
            .orders_for_user(owner.user_id, Page::default())
            .await
            .unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(total, 1);
    }
}
