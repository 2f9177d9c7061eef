//! Shared types for the settlement platform.
//!
//! Everything that crosses a service boundary lives here: identifier
//! newtypes, money in integer minor-currency units, and the event
//! envelope with one typed payload per topic.

pub mod events;
pub mod ids;
pub mod money;

pub use events::{Event, topics};
pub use ids::{Actor, OrderId, PaymentId, ProductId, UserId};
pub use money::{Currency, Money};
