//! Shared application state and wiring.

use std::sync::Arc;

use async_trait::async_trait;
use broker::{BrokerError, InMemoryBroker, MessageBroker};
use common::OrderId;
use orders::{
    CartReader, InMemoryCartService, InMemoryOrderStore, InMemoryProductCatalog, OrderService,
    OrderStore, ProductReader,
};
use payments::{
    InMemoryGateway, InMemoryPaymentStore, OrderDirectory, OrderSummary, PaymentError,
    PaymentGateway, PaymentService, PaymentStore,
};
use subscribers::{
    EmailSender, RecordingMailer, SellerDashboard, register_dashboard_handlers,
    register_notification_handlers,
};

/// Order service wired over trait objects so the state is one concrete type.
pub type DynOrderService =
    OrderService<Arc<dyn CartReader>, Arc<dyn ProductReader>, Arc<dyn OrderStore>>;

/// Payment service wired over trait objects.
pub type DynPaymentService =
    PaymentService<Arc<dyn PaymentGateway>, Arc<dyn PaymentStore>, Arc<dyn OrderDirectory>>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orders: DynOrderService,
    pub payments: DynPaymentService,
    pub dashboard: Arc<SellerDashboard>,
}

/// Bridges the payment orchestrator's order port onto the order store.
///
/// In the distributed deployment this port is an HTTP call into the order
/// service; in-process it reads the same store the order service writes.
pub struct OrderStoreDirectory {
    store: Arc<dyn OrderStore>,
}

impl OrderStoreDirectory {
    /// Creates a directory over an order store.
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl OrderDirectory for OrderStoreDirectory {
    async fn find_order(&self, order_id: OrderId) -> Result<Option<OrderSummary>, PaymentError> {
        let order = self
            .store
            .get(order_id)
            .await
            .map_err(|err| PaymentError::Upstream {
                service: "orders",
                reason: err.to_string(),
            })?;

        Ok(order.map(|o| OrderSummary {
            order_id: o.id,
            user_id: o.user_id,
            total: o.total,
            status: o.status.as_str().to_string(),
        }))
    }
}

/// Builds application state over explicit port implementations and
/// registers every subscriber on a fresh broker.
pub async fn create_state(
    carts: Arc<dyn CartReader>,
    products: Arc<dyn ProductReader>,
    order_store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    payment_store: Arc<dyn PaymentStore>,
    mailer: Arc<dyn EmailSender>,
    razorpay_key_secret: &str,
) -> Result<(Arc<AppState>, InMemoryBroker), BrokerError> {
    let broker = InMemoryBroker::new();
    let shared_broker: Arc<dyn MessageBroker> = Arc::new(broker.clone());

    let order_service: DynOrderService = OrderService::new(
        carts,
        products,
        order_store.clone(),
        shared_broker.clone(),
    );

    let directory = OrderStoreDirectory::new(order_store);
    let payment_service: DynPaymentService = PaymentService::new(
        gateway,
        payment_store,
        Arc::new(directory) as Arc<dyn OrderDirectory>,
        shared_broker,
        razorpay_key_secret,
    );

    let dashboard = Arc::new(SellerDashboard::new());
    register_notification_handlers(&broker, mailer).await?;
    register_dashboard_handlers(&broker, dashboard.clone()).await?;

    let state = Arc::new(AppState {
        orders: order_service,
        payments: payment_service,
        dashboard,
    });

    Ok((state, broker))
}

/// Everything the default in-memory wiring produces.
///
/// The fakes are returned alongside the state so tests (and the demo
/// binary) can seed carts, products, and gateway captures.
pub struct DefaultServices {
    pub state: Arc<AppState>,
    pub broker: InMemoryBroker,
    pub carts: InMemoryCartService,
    pub products: InMemoryProductCatalog,
    pub order_store: InMemoryOrderStore,
    pub gateway: InMemoryGateway,
    pub payment_store: InMemoryPaymentStore,
    pub mailer: RecordingMailer,
    pub dashboard: Arc<SellerDashboard>,
}

/// Creates the default application state with in-memory stores and fakes.
pub async fn create_default_state(
    razorpay_key_secret: &str,
) -> Result<DefaultServices, BrokerError> {
    let carts = InMemoryCartService::new();
    let products = InMemoryProductCatalog::new();
    let order_store = InMemoryOrderStore::new();
    let gateway = InMemoryGateway::new();
    let payment_store = InMemoryPaymentStore::new();
    let mailer = RecordingMailer::new();

    let (state, broker) = create_state(
        Arc::new(carts.clone()) as Arc<dyn CartReader>,
        Arc::new(products.clone()) as Arc<dyn ProductReader>,
        Arc::new(order_store.clone()) as Arc<dyn OrderStore>,
        Arc::new(gateway.clone()) as Arc<dyn PaymentGateway>,
        Arc::new(payment_store.clone()) as Arc<dyn PaymentStore>,
        Arc::new(mailer.clone()) as Arc<dyn EmailSender>,
        razorpay_key_secret,
    )
    .await?;

    let dashboard = state.dashboard.clone();
    Ok(DefaultServices {
        state,
        broker,
        carts,
        products,
        order_store,
        gateway,
        payment_store,
        mailer,
        dashboard,
    })
}
