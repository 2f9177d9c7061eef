//! HTTP API for the settlement platform.
//!
//! Exposes the order aggregation, payment orchestration, and seller
//! dashboard read models over axum, with bearer-token auth, structured
//! logging (tracing), and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Extension;
use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::TokenVerifier;
use state::AppState;

pub use state::{DefaultServices, create_default_state, create_state};

/// Creates the axum application router with all routes and shared state.
pub fn create_app(
    state: Arc<AppState>,
    verifier: Arc<TokenVerifier>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/order/create", post(routes::orders::create))
        .route("/order/me", get(routes::orders::list))
        .route("/order/me/{orderId}", get(routes::orders::get_by_id))
        .route("/order/cancel/{orderId}", post(routes::orders::cancel))
        .route(
            "/order/address/{orderId}",
            patch(routes::orders::update_address),
        )
        .route("/payment/create/{orderId}", post(routes::payments::create))
        .route("/payment/verify", post(routes::payments::verify))
        .route("/payment/me", get(routes::payments::list))
        .route("/seller/orders", get(routes::seller::orders))
        .route("/seller/payments", get(routes::seller::payments))
        .route("/seller/products", get(routes::seller::products))
        .with_state(state)
        .merge(metrics_router)
        .layer(Extension(verifier))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
