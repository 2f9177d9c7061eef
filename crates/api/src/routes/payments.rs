//! Payment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::OrderId;
use payments::{Payment, PaymentIntent, VerificationRequest};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// POST /payment/create/{orderId} — create a gateway intent for an order.
pub async fn create(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<(StatusCode, Json<PaymentIntent>), ApiError> {
    let intent = state
        .payments
        .create_payment(&user.actor, OrderId::from_uuid(order_id))
        .await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

/// POST /payment/verify — verify a gateway callback and settle.
pub async fn verify(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerificationRequest>,
) -> Result<Json<Payment>, ApiError> {
    let payment = state.payments.verify_payment(&user.actor, &request).await?;
    Ok(Json(payment))
}

/// GET /payment/me — list the caller's payments.
pub async fn list(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Payment>>, ApiError> {
    let payments = state.payments.payments_for_user(user.actor.user_id).await?;
    Ok(Json(payments))
}
