//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use orders::OrderError;
use payments::PaymentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or invalid credentials.
    Unauthorized(String),
    /// Authenticated but not allowed.
    Forbidden(String),
    /// Resource not found.
    NotFound(String),
    /// Order domain error.
    Order(OrderError),
    /// Payment domain error.
    Payment(PaymentError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Order(err) => (order_error_status(&err), err.to_string()),
            ApiError::Payment(err) => (payment_error_status(&err), err.to_string()),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        if status.is_server_error() {
            tracing::error!(%status, %message, "request failed");
        }

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn order_error_status(err: &OrderError) -> StatusCode {
    match err {
        OrderError::InvalidAddress { .. }
        | OrderError::EmptyCart
        | OrderError::CurrencyMismatch { .. } => StatusCode::BAD_REQUEST,
        OrderError::ProductNotFound { .. } | OrderError::NotFound { .. } => StatusCode::NOT_FOUND,
        OrderError::Forbidden { .. } => StatusCode::FORBIDDEN,
        OrderError::InsufficientStock { .. } | OrderError::InvalidState { .. } => {
            StatusCode::CONFLICT
        }
        OrderError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        OrderError::Store(_) | OrderError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn payment_error_status(err: &PaymentError) -> StatusCode {
    match err {
        PaymentError::MissingFields | PaymentError::Verification { .. } => StatusCode::BAD_REQUEST,
        PaymentError::NotFound { .. }
        | PaymentError::OrderNotFound { .. }
        | PaymentError::NoPaymentForOrder { .. } => StatusCode::NOT_FOUND,
        PaymentError::Forbidden => StatusCode::FORBIDDEN,
        PaymentError::NotCheckoutReady { .. } | PaymentError::AlreadyProcessed => {
            StatusCode::CONFLICT
        }
        PaymentError::Gateway(_) | PaymentError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        PaymentError::Store(_) | PaymentError::Serialization(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        ApiError::Payment(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::OrderId;
    use payments::FailureReason;

    #[test]
    fn order_errors_map_to_expected_statuses() {
        assert_eq!(
            order_error_status(&OrderError::EmptyCart),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            order_error_status(&OrderError::Upstream {
                service: "cart",
                reason: "down".to_string()
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            order_error_status(&OrderError::Forbidden {
                order_id: OrderId::new()
            }),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn payment_errors_map_to_expected_statuses() {
        assert_eq!(
            payment_error_status(&PaymentError::AlreadyProcessed),
            StatusCode::CONFLICT
        );
        assert_eq!(
            payment_error_status(&PaymentError::Verification {
                reason: FailureReason::InvalidSignature
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            payment_error_status(&PaymentError::NotFound {
                razorpay_order_id: "order_1".to_string()
            }),
            StatusCode::NOT_FOUND
        );
    }
}
