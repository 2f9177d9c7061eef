//! Durable publish/subscribe plumbing for settlement events.
//!
//! The broker is a port: services publish through [`MessageBroker`] and
//! consumers implement [`EventHandler`]. Delivery is at-least-once with
//! manual acknowledgment — a handler that returns `Ok` acks the message, a
//! handler that returns `Err` requeues it. Redelivery is bounded: after
//! `max_redeliveries` failed attempts the message is routed to the queue's
//! dead-letter sibling instead of spinning forever.
//!
//! Handlers must therefore be idempotent: a duplicate delivery of the same
//! event must not produce a second side effect.

mod client;
mod error;
mod handler;
mod memory;
mod pubsub;

pub use client::{Backoff, BrokerConnection, ConnectionState, Transport};
pub use error::{BrokerError, HandlerError};
pub use handler::EventHandler;
pub use memory::{DEFAULT_MAX_REDELIVERIES, InMemoryBroker, dead_letter_queue};
pub use pubsub::MessageBroker;
