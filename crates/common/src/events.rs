//! Event envelope and per-topic payload contracts.
//!
//! Every message on the queue is an [`Event`]: `{eventType, schemaVersion,
//! timestamp, data}`. Envelopes are immutable and consumed at-least-once,
//! so handlers must be idempotent under redelivery.
//!
//! Each topic has exactly one payload struct, constructed producer-side.
//! Producers embed every field a consumer needs (ids, email, username,
//! amounts) — consumers never fetch data back from the producing service.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::ids::{OrderId, PaymentId, ProductId, UserId};
use crate::money::Money;

/// Current schema version stamped on produced events.
pub const SCHEMA_VERSION: u16 = 1;

/// Queue names for every topic the platform produces or consumes.
pub mod topics {
    /// A new user account was created.
    pub const USER_REGISTERED: &str = "USER_REGISTERED";
    /// A user logged in.
    pub const USER_LOGIN: &str = "USER_LOGIN";
    /// A payment intent was created against the gateway.
    pub const PAYMENT_INITIATED: &str = "PAYMENT_INITIATED";
    /// A payment was verified and captured.
    pub const PAYMENT_SUCCESS: &str = "PAYMENT_SUCCESS";
    /// A payment verification failed.
    pub const PAYMENT_FAILED: &str = "PAYMENT_FAILED";
    /// An order was cancelled by its owner.
    pub const ORDER_CANCELLED: &str = "ORDER_CANCELLED";
    /// A product was added to the catalog.
    pub const PRODUCT_CREATED: &str = "PRODUCT_CREATED";

    // Seller-dashboard projection topics. Fed by the same producers as the
    // notification topics above so dashboard consumption never competes
    // with notification consumption.

    /// Dashboard copy of a registered user.
    pub const SELLER_USER_REGISTERED: &str = "SELLER_USER_REGISTERED";
    /// Dashboard copy of a created order.
    pub const SELLER_ORDER_CREATED: &str = "SELLER_ORDER_CREATED";
    /// Dashboard copy of an initiated payment.
    pub const SELLER_PAYMENT_INITIATED: &str = "SELLER_PAYMENT_INITIATED";
    /// Dashboard copy of a created product.
    pub const SELLER_PRODUCT_CREATED: &str = "SELLER_PRODUCT_CREATED";
}

/// An immutable event envelope as it travels on the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Topic name, e.g. `"PAYMENT_SUCCESS"`.
    pub event_type: String,

    /// Payload schema version for this topic.
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,

    /// When the producer emitted the event.
    pub timestamp: DateTime<Utc>,

    /// The typed payload, serialized as JSON.
    pub data: serde_json::Value,
}

fn default_schema_version() -> u16 {
    SCHEMA_VERSION
}

impl Event {
    /// Creates an envelope for a topic from its typed payload.
    pub fn new<T: Serialize>(
        event_type: impl Into<String>,
        data: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type: event_type.into(),
            schema_version: SCHEMA_VERSION,
            timestamp: Utc::now(),
            data: serde_json::to_value(data)?,
        })
    }

    /// Deserializes the payload into the topic's typed struct.
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

/// Payload for [`topics::USER_REGISTERED`] and
/// [`topics::SELLER_USER_REGISTERED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRegisteredData {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
}

/// Payload for [`topics::USER_LOGIN`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLoginData {
    pub user_id: UserId,
    pub email: String,
    pub ip: String,
}

/// Payload for [`topics::PAYMENT_INITIATED`] and
/// [`topics::SELLER_PAYMENT_INITIATED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitiatedData {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub order_id: OrderId,
    pub amount: Money,
}

/// Payload for [`topics::PAYMENT_SUCCESS`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSuccessData {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub order_id: OrderId,
    pub payment_id: String,
    pub amount: Money,
}

/// Payload for [`topics::PAYMENT_FAILED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentFailedData {
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub order_id: OrderId,
    pub reason: String,
}

/// Payload for [`topics::ORDER_CANCELLED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelledData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub email: String,
    pub username: String,
    pub total: Money,
}

/// Payload for [`topics::SELLER_ORDER_CREATED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerOrderCreatedData {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub total: Money,
    pub item_count: u32,
    pub created_at: DateTime<Utc>,
}

/// Payload for [`topics::PRODUCT_CREATED`] and
/// [`topics::SELLER_PRODUCT_CREATED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreatedData {
    pub product_id: ProductId,
    pub seller_id: UserId,
    pub title: String,
    pub price: Money,
}
