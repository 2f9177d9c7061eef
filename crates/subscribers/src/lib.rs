//! Event fan-out consumers.
//!
//! Two families of subscribers hang off the broker: notification handlers
//! that send email, and dashboard projection handlers that materialize
//! read-model rows for sellers. Delivery is at-least-once, so every
//! handler here is idempotent — notifications dedupe on the event's
//! natural key, projections upsert rows keyed by the upstream entity id.

pub mod dashboard;
pub mod email;
pub mod error;
pub mod notifications;

pub use dashboard::{
    OrderRow, PaymentRow, ProductRow, SellerDashboard, UserRow, register_dashboard_handlers,
};
pub use email::{Email, EmailSender, RecordingMailer};
pub use error::SubscriberError;
pub use notifications::register_notification_handlers;
