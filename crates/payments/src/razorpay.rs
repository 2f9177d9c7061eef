//! Razorpay REST client (no SDK dependency).

use async_trait::async_trait;
use common::Money;
use reqwest::StatusCode;

use crate::error::PaymentError;
use crate::gateway::{GatewayOrder, GatewayPayment, PaymentGateway};

const DEFAULT_BASE_URL: &str = "https://api.razorpay.com";

/// Razorpay-backed payment gateway.
///
/// Talks to the Orders and Payments REST APIs with basic auth
/// (`key_id:key_secret`). Amounts are passed through in minor currency
/// units, which is also Razorpay's native unit.
#[derive(Debug, Clone)]
pub struct RazorpayGateway {
    client: reqwest::Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayGateway {
    /// Creates a gateway client with merchant credentials.
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        Self::with_base_url(key_id, key_secret, DEFAULT_BASE_URL)
    }

    /// Creates a client against a non-default endpoint (test doubles).
    pub fn with_base_url(
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            key_id: key_id.into(),
            key_secret: key_secret.into(),
        }
    }

    fn upstream(err: reqwest::Error) -> PaymentError {
        PaymentError::Upstream {
            service: "razorpay",
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(
        &self,
        amount: Money,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        let url = format!("{}/v1/orders", self.base_url);
        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({
                "amount": amount.amount(),
                "currency": amount.currency().as_str(),
                "receipt": receipt,
            }))
            .send()
            .await
            .map_err(Self::upstream)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway(format!(
                "order creation failed with {status}: {body}"
            )));
        }

        response.json().await.map_err(Self::upstream)
    }

    async fn fetch_payment(
        &self,
        payment_id: &str,
    ) -> Result<Option<GatewayPayment>, PaymentError> {
        let url = format!("{}/v1/payments/{payment_id}", self.base_url);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .map_err(Self::upstream)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(PaymentError::Gateway(format!(
                "payment fetch failed with {status}"
            )));
        }

        let payment: GatewayPayment = response.json().await.map_err(Self::upstream)?;
        Ok(Some(payment))
    }
}
