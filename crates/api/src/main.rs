//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use broker::{BrokerConnection, InMemoryBroker};
use orders::{CartReader, HttpCartClient, HttpProductClient, OrderStore, PostgresOrderStore, ProductReader};
use payments::{PaymentGateway, PaymentStore, PostgresPaymentStore, RazorpayGateway};
use subscribers::{EmailSender, RecordingMailer};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use api::auth::TokenVerifier;
use api::config::Config;
use api::state::AppState;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Wires the distributed deployment: Postgres persistence, HTTP upstream
/// clients, and the live gateway.
async fn create_live_state(
    config: &Config,
    database_url: &str,
) -> (Arc<AppState>, InMemoryBroker) {
    let pool = sqlx::postgres::PgPoolOptions::new()
        .connect(database_url)
        .await
        .expect("database connection failed");

    let order_store = PostgresOrderStore::new(pool.clone());
    order_store
        .ensure_schema()
        .await
        .expect("orders schema migration failed");
    let payment_store = PostgresPaymentStore::new(pool);
    payment_store
        .ensure_schema()
        .await
        .expect("payments schema migration failed");

    api::create_state(
        Arc::new(HttpCartClient::new(config.cart_service_url.clone())) as Arc<dyn CartReader>,
        Arc::new(HttpProductClient::new(config.product_service_url.clone()))
            as Arc<dyn ProductReader>,
        Arc::new(order_store) as Arc<dyn OrderStore>,
        Arc::new(RazorpayGateway::new(
            config.razorpay_key_id.clone(),
            config.razorpay_key_secret.clone(),
        )) as Arc<dyn PaymentGateway>,
        Arc::new(payment_store) as Arc<dyn PaymentStore>,
        Arc::new(RecordingMailer::new()) as Arc<dyn EmailSender>,
        &config.razorpay_key_secret,
    )
    .await
    .expect("failed to wire services")
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Wire services, stores, and subscribers
    let (state, broker) = match config.database_url.clone() {
        Some(database_url) => create_live_state(&config, &database_url).await,
        None => {
            tracing::info!("DATABASE_URL not set, using in-memory wiring");
            let services = api::create_default_state(&config.razorpay_key_secret)
                .await
                .expect("failed to wire default services");
            (services.state, services.broker)
        }
    };

    // 4. Establish the broker connection and start the dispatcher
    let connection = BrokerConnection::new(broker.clone());
    connection
        .connect()
        .await
        .expect("broker connection failed");

    let dispatcher = broker.clone();
    tokio::spawn(async move {
        dispatcher.run_dispatcher(Duration::from_millis(100)).await;
    });

    // 5. Build the application
    let verifier = Arc::new(TokenVerifier::new(&config.jwt_secret));
    let app = api::create_app(state, verifier, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
