//! Order aggregation.
//!
//! Assembles an order from a point-in-time cart snapshot and product
//! snapshots fetched over narrow ports, validates stock, computes totals,
//! and persists the order. The order write is the commit point; clearing
//! the source cart afterwards is best-effort.

pub mod error;
pub mod http;
pub mod model;
pub mod ports;
pub mod postgres;
pub mod service;
pub mod store;

pub use error::OrderError;
pub use http::{HttpCartClient, HttpProductClient};
pub use model::{Order, OrderItem, OrderStatus, ShippingAddress};
pub use ports::{
    CartItem, CartReader, CartSnapshot, InMemoryCartService, InMemoryProductCatalog, ProductReader,
    ProductSnapshot,
};
pub use postgres::PostgresOrderStore;
pub use service::OrderService;
pub use store::{InMemoryOrderStore, OrderStore, Page};
