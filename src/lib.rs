//! Bragfeed - Review Feed API Core
//!
//! This crate provides the service core of Bragfeed, a SaaS that exposes
//! Google Business Profile reviews through a rate-limited API and manages
//! billing via Stripe subscriptions.
//!
//! # Features
//!
//! - **Event Rate Limiting**: Sliding-window admission keyed by
//!   (user, event type) over a durable event log, failing open on store
//!   outage
//! - **Webhook Reconciliation**: Idempotent processing of Stripe billing
//!   events, tolerant of duplicate and out-of-order delivery
//! - **Signature Verification**: HMAC-SHA256 validation of webhook
//!   deliveries before any handler runs
//! - **HTTP Surface**: axum router exposing the review feed, webhook
//!   endpoint, and health/status/metrics probes
//!
//! # Architecture
//!
//! ```text
//! Client ──▶ /api/reviews/fetch ──▶ EventRateLimiter ──▶ ReviewSource
//!                                        │
//!                                        ▼
//!                                   EventStore
//!
//! Stripe ──▶ /api/purchases/webhook ──▶ SignatureVerifier
//!                                        │
//!                                        ▼
//!                                  WebhookReconciler ──▶ SubscriberStore
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bragfeed::reviews::StaticReviewSource;
//! use bragfeed::server::{router, AppState};
//! use bragfeed::store::{InMemoryEventStore, InMemorySubscriberStore};
//! use bragfeed::stripe::{StripeWebhookConfig, StripeWebhookState};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let subscribers = Arc::new(InMemorySubscriberStore::new());
//!     let state = AppState::new(
//!         Arc::new(InMemoryEventStore::new()),
//!         subscribers.clone(),
//!         Arc::new(StaticReviewSource::new()),
//!     );
//!
//!     let config = StripeWebhookConfig::from_env()?;
//!     let webhook = Arc::new(StripeWebhookState::new(&config, subscribers));
//!
//!     let app = router(state, webhook);
//!     bragfeed::server::serve("127.0.0.1:3000".parse()?, app).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cors;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod ratelimit;
pub mod retry;
pub mod reviews;
pub mod server;
pub mod store;
pub mod stripe;

// Re-exports for convenience
pub use error::{Error, Result};
pub use ratelimit::{Decision, EventRateLimiter, RateLimitConfig};
pub use retry::{poll_until_some, RetryPolicy};
pub use stripe::{StripeEvent, WebhookOutcome, WebhookReconciler};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
