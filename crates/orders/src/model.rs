//! Order model and status machine.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// Where an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub country: String,
}

impl ShippingAddress {
    /// Checks that every field is present.
    pub fn validate(&self) -> Result<(), OrderError> {
        let missing = if self.street.trim().is_empty() {
            Some("street")
        } else if self.city.trim().is_empty() {
            Some("city")
        } else if self.state.trim().is_empty() {
            Some("state")
        } else if self.zip.trim().is_empty() {
            Some("zip")
        } else if self.country.trim().is_empty() {
            Some("country")
        } else {
            None
        };

        match missing {
            Some(field) => Err(OrderError::InvalidAddress { field }),
            None => Ok(()),
        }
    }
}

/// The status of an order in its lifecycle.
///
/// Transitions:
/// ```text
/// PENDING ──┬──► SHIPPED ──► DELIVERED
///           └──► CANCELLED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    /// Awaiting payment; the only status that permits mutation.
    #[default]
    Pending,
    /// Cancelled by its owner (terminal).
    Cancelled,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer (terminal).
    Delivered,
}

impl OrderStatus {
    /// Returns true if the order can still be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if the shipping address can still change.
    pub fn can_update_address(&self) -> bool {
        matches!(self, OrderStatus::Pending)
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Delivered)
    }

    /// Returns the status label as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
        }
    }

    /// Parses a wire label.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "PENDING" => Some(OrderStatus::Pending),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            "SHIPPED" => Some(OrderStatus::Shipped),
            "DELIVERED" => Some(OrderStatus::Delivered),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A priced line in an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// The product this line refers to.
    pub product_id: ProductId,

    /// Quantity ordered.
    pub quantity: u32,

    /// Snapshot of the product's unit price at order time.
    pub unit_price: Money,

    /// `unit_price × quantity`.
    pub total_price: Money,
}

impl OrderItem {
    /// Creates a line, deriving the line total from the unit price.
    pub fn new(product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        Self {
            product_id,
            quantity,
            unit_price,
            total_price: unit_price.multiply(quantity),
        }
    }
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    /// Sum of every line's `total_price`.
    pub total: Money,
    pub shipping_address: ShippingAddress,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Returns true if the order belongs to the given user.
    pub fn owned_by(&self, user_id: UserId) -> bool {
        self.user_id == user_id
    }

    /// Number of lines in the order.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
}
