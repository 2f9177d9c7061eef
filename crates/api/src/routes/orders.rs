//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::OrderId;
use orders::{Order, Page, ShippingAddress};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Shipping address as the client sends it (`pincode` on the wire).
#[derive(Debug, Deserialize)]
pub struct AddressPayload {
    pub street: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub country: String,
}

impl From<AddressPayload> for ShippingAddress {
    fn from(payload: AddressPayload) -> Self {
        ShippingAddress {
            street: payload.street,
            city: payload.city,
            state: payload.state,
            zip: payload.pincode,
            country: payload.country,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(rename = "shippingAddress")]
    pub shipping_address: Option<AddressPayload>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct PageMeta {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

#[derive(Serialize)]
pub struct OrdersPageResponse {
    pub orders: Vec<Order>,
    pub meta: PageMeta,
}

/// POST /order/create — aggregate the caller's cart into a pending order.
pub async fn create(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let address: ShippingAddress = request
        .shipping_address
        .ok_or_else(|| ApiError::BadRequest("shippingAddress is required".to_string()))?
        .into();

    let order = state
        .orders
        .create_order(&user.actor, address, &user.token)
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /order/me — list the caller's orders, paginated.
pub async fn list(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<OrdersPageResponse>, ApiError> {
    let page = Page::new(query.page.unwrap_or(1), query.limit.unwrap_or(20));
    let (orders, total) = state
        .orders
        .orders_for_user(user.actor.user_id, page)
        .await?;

    Ok(Json(OrdersPageResponse {
        orders,
        meta: PageMeta {
            total,
            page: page.page,
            limit: page.limit,
        },
    }))
}

/// GET /order/me/{orderId} — load one of the caller's orders.
pub async fn get_by_id(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .orders
        .get_order(user.actor.user_id, OrderId::from_uuid(order_id))
        .await?;
    Ok(Json(order))
}

/// POST /order/cancel/{orderId} — cancel a pending order.
pub async fn cancel(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .orders
        .cancel_order(&user.actor, OrderId::from_uuid(order_id))
        .await?;
    Ok(Json(order))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAddressRequest {
    #[serde(rename = "shippingAddress")]
    pub shipping_address: Option<AddressPayload>,
}

/// PATCH /order/address/{orderId} — replace a pending order's address.
pub async fn update_address(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateAddressRequest>,
) -> Result<Json<Order>, ApiError> {
    let address: ShippingAddress = request
        .shipping_address
        .ok_or_else(|| ApiError::BadRequest("shippingAddress is required".to_string()))?
        .into();

    let order = state
        .orders
        .update_shipping_address(&user.actor, OrderId::from_uuid(order_id), address)
        .await?;
    Ok(Json(order))
}
