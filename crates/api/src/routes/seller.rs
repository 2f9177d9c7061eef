//! Seller dashboard endpoints, backed by the projected read models.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use subscribers::{OrderRow, PaymentRow, ProductRow};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /seller/orders — projected orders, newest first.
pub async fn orders(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OrderRow>>, ApiError> {
    user.require_seller()?;
    Ok(Json(state.dashboard.orders().await))
}

/// GET /seller/payments — projected payment initiations.
pub async fn payments(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PaymentRow>>, ApiError> {
    user.require_seller()?;
    Ok(Json(state.dashboard.payments().await))
}

/// GET /seller/products — the caller's projected products.
pub async fn products(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ProductRow>>, ApiError> {
    user.require_seller()?;
    Ok(Json(
        state.dashboard.products_for_seller(user.actor.user_id).await,
    ))
}
