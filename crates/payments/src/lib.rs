//! Payment orchestration.
//!
//! Creates gateway payment intents scoped to an order and verifies gateway
//! callbacks before settling. Verification is tamper-resistant: the
//! callback signature, the gateway's own capture status, and the persisted
//! amount are all cross-checked — the gateway, not the client, is the
//! source of truth for capture. The payment status field is the only
//! resource mutated with compare-and-swap, because client retries and
//! webhooks can race on the same payment.

pub mod error;
pub mod gateway;
pub mod model;
pub mod ports;
pub mod postgres;
pub mod razorpay;
pub mod service;
pub mod signature;
pub mod store;

pub use error::PaymentError;
pub use gateway::{CaptureStatus, GatewayOrder, GatewayPayment, InMemoryGateway, PaymentGateway};
pub use razorpay::RazorpayGateway;
pub use model::{FailureReason, Payment, PaymentIntent, PaymentStatus};
pub use ports::{InMemoryOrderDirectory, OrderDirectory, OrderSummary};
pub use postgres::PostgresPaymentStore;
pub use service::{PaymentService, VerificationRequest};
pub use store::{InMemoryPaymentStore, PaymentStore};
