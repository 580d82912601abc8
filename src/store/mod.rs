//! Durable Store Abstractions
//!
//! The service core coordinates exclusively through durable storage: the
//! rate limiter counts and appends to an event log, and the webhook
//! reconciler reads and mutates subscriber billing state. Both sides are
//! expressed as traits so the concrete backend (Postgres in production,
//! in-memory for local development and tests) stays out of the core.
//!
//! # Architecture
//!
//! ```text
//! EventRateLimiter ──▶ EventStore       (append-only rate limit log)
//! WebhookReconciler ──▶ SubscriberStore (subscribers + payments)
//!                            │
//!                            ▼
//!                     backend adapter (memory::* here)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;

pub use memory::{InMemoryEventStore, InMemorySubscriberStore};

/// Errors surfaced by a store backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend could not be reached or the query failed
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A write violated a data constraint
    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

// =============================================================================
// Records
// =============================================================================

/// One admitted request in the rate limit log.
///
/// Append-only: rows are inserted on admission and never updated or
/// deleted by this core (retention is an external job's concern).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRecord {
    /// The user the admitted request belonged to
    pub user_id: String,
    /// Tag identifying the limited action (e.g. "fetch_reviews")
    pub event_type: String,
    /// When the request was admitted
    pub timestamp: DateTime<Utc>,
}

/// A billing subscriber.
///
/// `stripe_customer_id` starts unset and is bound by the checkout
/// handler; `has_active_subscription` flips to true when a checkout
/// completes or an invoice is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    /// Internal account id
    pub id: String,
    /// External payment identity, once a checkout has bound it
    pub stripe_customer_id: Option<String>,
    /// Whether the subscriber currently has a paid subscription
    pub has_active_subscription: bool,
}

impl Subscriber {
    /// A subscriber that has never been through checkout.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            stripe_customer_id: None,
            has_active_subscription: false,
        }
    }
}

/// One successfully charged invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPayment {
    /// Internal account id the payment was resolved to
    pub user_id: String,
    /// The Stripe customer the invoice was issued to
    pub stripe_customer_id: String,
    /// Stripe invoice id; unique across all payments
    pub invoice_id: String,
    /// Amount paid, in the currency's minor unit
    pub amount: i64,
    /// ISO currency code as sent by Stripe (e.g. "usd")
    pub currency: String,
    /// Why the invoice was issued (e.g. "subscription_create")
    pub billing_reason: Option<String>,
    /// Start of the billing period covered by the payment
    pub subscription_start: DateTime<Utc>,
    /// End of the billing period covered by the payment
    pub subscription_end: DateTime<Utc>,
    /// When Stripe created the invoice
    pub created_at: DateTime<Utc>,
}

/// Outcome of a payment insert keyed by invoice id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentInsert {
    /// A new row was written
    Inserted,
    /// A payment with this invoice id already existed; nothing written
    AlreadyRecorded,
}

// =============================================================================
// Traits
// =============================================================================

/// Append-only log of admitted requests, queryable by windowed count.
#[async_trait::async_trait]
pub trait EventStore: Send + Sync {
    /// Count records matching (user, event type) with a timestamp at or
    /// after `window_start`.
    async fn count_since(
        &self,
        user_id: &str,
        event_type: &str,
        window_start: DateTime<Utc>,
    ) -> StoreResult<u64>;

    /// Append one record for an admitted request.
    async fn record(
        &self,
        user_id: &str,
        event_type: &str,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<()>;
}

/// Subscriber billing state and payment history.
#[async_trait::async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Bind a Stripe customer id to a subscriber and mark the
    /// subscription active. A no-op when no subscriber has this id,
    /// mirroring an UPDATE that matches zero rows.
    async fn link_stripe_customer(&self, user_id: &str, customer_id: &str) -> StoreResult<()>;

    /// Look up the subscriber bound to a Stripe customer id.
    async fn find_user_by_customer(&self, customer_id: &str) -> StoreResult<Option<String>>;

    /// Set the active-subscription flag for a subscriber.
    async fn set_active_subscription(&self, user_id: &str, active: bool) -> StoreResult<()>;

    /// Insert a payment unless one with the same invoice id exists.
    async fn insert_payment(&self, payment: SubscriptionPayment) -> StoreResult<PaymentInsert>;
}
