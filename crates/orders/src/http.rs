//! HTTP implementations of the cart and product ports.
//!
//! These talk to the cart and catalog services over REST, forwarding the
//! caller's bearer token. Transport failures and non-success statuses map
//! to `UpstreamUnavailable` so the API surfaces them as 502.

use async_trait::async_trait;
use common::{ProductId, UserId};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::OrderError;
use crate::ports::{CartItem, CartReader, CartSnapshot, ProductReader, ProductSnapshot};

#[derive(Debug, Deserialize)]
struct CartItemsResponse {
    data: CartData,
}

#[derive(Debug, Deserialize)]
struct CartData {
    cart: CartBody,
}

#[derive(Debug, Deserialize)]
struct CartBody {
    items: Vec<CartItem>,
}

#[derive(Debug, Deserialize)]
struct ProductResponse {
    data: ProductSnapshot,
}

/// Cart service client.
#[derive(Debug, Clone)]
pub struct HttpCartClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpCartClient {
    /// Creates a client against the cart service's base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn upstream(err: reqwest::Error) -> OrderError {
        OrderError::Upstream {
            service: "cart",
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl CartReader for HttpCartClient {
    async fn cart_for_user(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<CartSnapshot, OrderError> {
        let url = format!("{}/api/cart/items", self.base_url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(Self::upstream)?;

        if !response.status().is_success() {
            return Err(OrderError::Upstream {
                service: "cart",
                reason: format!("status {}", response.status()),
            });
        }

        let body: CartItemsResponse = response.json().await.map_err(Self::upstream)?;
        Ok(CartSnapshot {
            user_id,
            items: body.data.cart.items,
        })
    }

    async fn clear_cart(&self, _user_id: UserId, token: &str) -> Result<(), OrderError> {
        let url = format!("{}/api/cart/clear", self.base_url);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(Self::upstream)?;

        if !response.status().is_success() {
            return Err(OrderError::Upstream {
                service: "cart",
                reason: format!("status {}", response.status()),
            });
        }
        Ok(())
    }
}

/// Product catalog client.
#[derive(Debug, Clone)]
pub struct HttpProductClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProductClient {
    /// Creates a client against the catalog service's base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn upstream(err: reqwest::Error) -> OrderError {
        OrderError::Upstream {
            service: "products",
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl ProductReader for HttpProductClient {
    async fn product(
        &self,
        product_id: ProductId,
        token: &str,
    ) -> Result<Option<ProductSnapshot>, OrderError> {
        let url = format!("{}/api/products/{}", self.base_url, product_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(Self::upstream)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(OrderError::Upstream {
                service: "products",
                reason: format!("status {}", response.status()),
            });
        }

        let body: ProductResponse = response.json().await.map_err(Self::upstream)?;
        Ok(Some(body.data))
    }
}
