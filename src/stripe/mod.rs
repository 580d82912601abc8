//! Stripe Webhook Handling
//!
//! Secure webhook handling for the subscription billing lifecycle:
//!
//! - **Signature Verification**: HMAC-SHA256 validation of the
//!   `stripe-signature` header before any handler runs
//! - **Reconciliation**: checkout completion binds a Stripe customer to a
//!   subscriber; invoice payment records the charge
//! - **Out-of-Order Tolerance**: the invoice handler polls for the
//!   checkout handler's write before declaring the customer unknown
//! - **Idempotency**: payments are keyed by invoice id, so redelivered
//!   events record nothing twice
//!
//! # Architecture
//!
//! ```text
//! Request -> Signature Verify -> Parse Event -> Reconcile -> Ack
//!                  |                  |             |
//!                  v                  v             v
//!                 400                400      200 / 200 (handled) / 202
//! ```
//!
//! # Security
//!
//! - Webhook signing secret loaded from the environment, never hardcoded
//! - Constant-time signature comparison to prevent timing attacks
//! - Raw body bytes verified before any JSON parsing

pub mod config;
pub mod error;
pub mod events;
pub mod handler;
pub mod reconciler;
pub mod signature;

// Re-export commonly used items
pub use config::StripeWebhookConfig;
pub use error::{WebhookError, WebhookResult};
pub use events::{CheckoutSession, Invoice, Period, StripeEvent, StripeEventType};
pub use handler::{stripe_webhook_handler, stripe_webhook_router, StripeWebhookState};
pub use reconciler::{WebhookOutcome, WebhookReconciler};
pub use signature::{SignatureError, SignatureVerifier};
