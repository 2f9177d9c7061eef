//! Payment record and terminal state machine.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId, UserId};
use serde::{Deserialize, Serialize};

use crate::gateway::GatewayOrder;

/// The state of a payment.
///
/// Exactly one terminal transition out of `PENDING` is permitted:
/// `PENDING → COMPLETED` xor `PENDING → FAILED`. Both terminal states are
/// immutable; the store enforces this with a compare-and-swap on status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    /// Awaiting gateway confirmation.
    #[default]
    Pending,
    /// Verified and captured (terminal).
    Completed,
    /// Verification failed (terminal).
    Failed,
}

impl PaymentStatus {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }

    /// Returns the status label as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Completed => "COMPLETED",
            PaymentStatus::Failed => "FAILED",
        }
    }

    /// Parses a wire label.
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "PENDING" => Some(PaymentStatus::Pending),
            "COMPLETED" => Some(PaymentStatus::Completed),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a payment verification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureReason {
    /// The callback signature did not match the expected HMAC.
    InvalidSignature,
    /// The gateway does not report the payment as captured.
    NotCaptured,
    /// The gateway amount or currency differs from the persisted payment.
    AmountMismatch,
}

impl FailureReason {
    /// Returns the reason tag as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::InvalidSignature => "INVALID_SIGNATURE",
            FailureReason::NotCaptured => "NOT_CAPTURED",
            FailureReason::AmountMismatch => "AMOUNT_MISMATCH",
        }
    }

    /// Parses a wire tag.
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "INVALID_SIGNATURE" => Some(FailureReason::InvalidSignature),
            "NOT_CAPTURED" => Some(FailureReason::NotCaptured),
            "AMOUNT_MISMATCH" => Some(FailureReason::AmountMismatch),
            _ => None,
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted payment record.
///
/// Created when an order enters checkout; never deleted. Terminal
/// transitions append the gateway payment id and signature (success) or
/// the failure reason (failure).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    /// Gateway-side order id the intent was created under.
    pub razorpay_order_id: String,
    /// Gateway-side payment id, set on completion.
    pub payment_id: Option<String>,
    /// Verified callback signature, set on completion.
    pub signature: Option<String>,
    pub status: PaymentStatus,
    pub amount: Money,
    pub failure_reason: Option<FailureReason>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new pending payment for an order.
    pub fn pending(
        order_id: OrderId,
        user_id: UserId,
        razorpay_order_id: impl Into<String>,
        amount: Money,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            order_id,
            user_id,
            razorpay_order_id: razorpay_order_id.into(),
            payment_id: None,
            signature: None,
            status: PaymentStatus::Pending,
            amount,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }
}

/// What checkout hands back to the client: the gateway order to pay
/// against and the pending payment record.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntent {
    pub razorpay_order: GatewayOrder,
    pub payment: Payment,
}
