//! Ports to the cart and product services, with in-memory fakes.
//!
//! Order aggregation reads remote state through these narrow interfaces so
//! the remote calls can be faked in tests and wrapped (circuit breakers,
//! retries) without touching the aggregation logic.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Money, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// One entry in a cart snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A point-in-time copy of a user's cart.
///
/// A value, not a live reference: the order is built from this copy and
/// later cart mutations do not affect it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartSnapshot {
    pub user_id: UserId,
    pub items: Vec<CartItem>,
}

/// A point-in-time copy of a catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub title: String,
    pub price: Money,
    pub stock: u32,
    pub seller_id: UserId,
}

/// Read and clear access to the cart service.
#[async_trait]
pub trait CartReader: Send + Sync {
    /// Fetches the user's cart snapshot.
    ///
    /// The caller's token is forwarded so the cart service applies its own
    /// authorization.
    async fn cart_for_user(&self, user_id: UserId, token: &str)
    -> Result<CartSnapshot, OrderError>;

    /// Empties the user's cart.
    async fn clear_cart(&self, user_id: UserId, token: &str) -> Result<(), OrderError>;
}

/// Read access to the product catalog.
#[async_trait]
pub trait ProductReader: Send + Sync {
    /// Fetches one product snapshot; `None` if the catalog has no such id.
    async fn product(
        &self,
        product_id: ProductId,
        token: &str,
    ) -> Result<Option<ProductSnapshot>, OrderError>;
}

#[async_trait]
impl<T: CartReader + ?Sized> CartReader for Arc<T> {
    async fn cart_for_user(
        &self,
        user_id: UserId,
        token: &str,
    ) -> Result<CartSnapshot, OrderError> {
        (**self).cart_for_user(user_id, token).await
    }

    async fn clear_cart(&self, user_id: UserId, token: &str) -> Result<(), OrderError> {
        (**self).clear_cart(user_id, token).await
    }
}

#[async_trait]
impl<T: ProductReader + ?Sized> ProductReader for Arc<T> {
    async fn product(
        &self,
        product_id: ProductId,
        token: &str,
    ) -> Result<Option<ProductSnapshot>, OrderError> {
        (**self).product(product_id, token).await
    }
}

#[derive(Debug, Default)]
struct InMemoryCartState {
    carts: HashMap<UserId, Vec<CartItem>>,
    unavailable: bool,
    fail_on_clear: bool,
}

/// In-memory cart service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCartService {
    state: Arc<RwLock<InMemoryCartState>>,
}

impl InMemoryCartService {
    /// Creates an empty cart service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the user's cart contents.
    pub fn set_cart(&self, user_id: UserId, items: Vec<CartItem>) {
        self.state.write().unwrap().carts.insert(user_id, items);
    }

    /// Makes every call fail with `UpstreamUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Makes only `clear_cart` fail.
    pub fn set_fail_on_clear(&self, fail: bool) {
        self.state.write().unwrap().fail_on_clear = fail;
    }

    /// Returns the user's current cart contents.
    pub fn cart_contents(&self, user_id: UserId) -> Vec<CartItem> {
        self.state
            .read()
            .unwrap()
            .carts
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl CartReader for InMemoryCartService {
    async fn cart_for_user(
        &self,
        user_id: UserId,
        _token: &str,
    ) -> Result<CartSnapshot, OrderError> {
        let state = self.state.read().unwrap();
        if state.unavailable {
            return Err(OrderError::Upstream {
                service: "cart",
                reason: "connection refused".to_string(),
            });
        }
        Ok(CartSnapshot {
            user_id,
            items: state.carts.get(&user_id).cloned().unwrap_or_default(),
        })
    }

    async fn clear_cart(&self, user_id: UserId, _token: &str) -> Result<(), OrderError> {
        let mut state = self.state.write().unwrap();
        if state.unavailable || state.fail_on_clear {
            return Err(OrderError::Upstream {
                service: "cart",
                reason: "connection refused".to_string(),
            });
        }
        state.carts.remove(&user_id);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: HashMap<ProductId, ProductSnapshot>,
    unavailable: bool,
}

/// In-memory product catalog for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProductCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryProductCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a product snapshot.
    pub fn insert_product(&self, product: ProductSnapshot) {
        self.state
            .write()
            .unwrap()
            .products
            .insert(product.id, product);
    }

    /// Makes every call fail with `UpstreamUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }
}

#[async_trait]
impl ProductReader for InMemoryProductCatalog {
    async fn product(
        &self,
        product_id: ProductId,
        _token: &str,
    ) -> Result<Option<ProductSnapshot>, OrderError> {
        let state = self.state.read().unwrap();
        if state.unavailable {
            return Err(OrderError::Upstream {
                service: "products",
                reason: "connection refused".to_string(),
            });
        }
        Ok(state.products.get(&product_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Currency;

    fn snapshot(stock: u32) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(),
            title: "Widget".to_string(),
            price: Money::new(10000, Currency::Inr),
            stock,
            seller_id: UserId::new(),
        }
    }

    #[tokio::test]
    async fn cart_snapshot_is_a_copy() {
        let carts = InMemoryCartService::new();
        let user = UserId::new();
        let product = ProductId::new();
        carts.set_cart(
            user,
            vec![CartItem {
                product_id: product,
                quantity: 2,
            }],
        );

        let snapshot = carts.cart_for_user(user, "token").await.unwrap();
        carts.set_cart(user, vec![]);

        // The earlier snapshot is unaffected by the later mutation.
        assert_eq!(snapshot.items.len(), 1);
        assert_eq!(snapshot.items[0].quantity, 2);
    }

    #[tokio::test]
    async fn unknown_user_has_empty_cart() {
        let carts = InMemoryCartService::new();
        let snapshot = carts.cart_for_user(UserId::new(), "token").await.unwrap();
        assert!(snapshot.items.is_empty());
    }

    #[tokio::test]
    async fn unavailable_cart_service_errors() {
        let carts = InMemoryCartService::new();
        carts.set_unavailable(true);
        let result = carts.cart_for_user(UserId::new(), "token").await;
        assert!(matches!(result, Err(OrderError::Upstream { .. })));
    }

    #[tokio::test]
    async fn clear_cart_empties_contents() {
        let carts = InMemoryCartService::new();
        let user = UserId::new();
        carts.set_cart(
            user,
            vec![CartItem {
                product_id: ProductId::new(),
                quantity: 1,
            }],
        );

        carts.clear_cart(user, "token").await.unwrap();
        assert!(carts.cart_contents(user).is_empty());
    }

    #[tokio::test]
    async fn catalog_lookup_misses_return_none() {
        let catalog = InMemoryProductCatalog::new();
        catalog.insert_product(snapshot(5));
        let missing = catalog.product(ProductId::new(), "token").await.unwrap();
        assert!(missing.is_none());
    }
}
