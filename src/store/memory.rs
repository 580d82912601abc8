//! In-Memory Store Backend
//!
//! Lock-protected vectors and maps implementing the store traits. This is
//! the backend the binary ships with for local development, and the one
//! the test suite runs against. All methods are synchronous under the
//! hood; no lock is held across an await point.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::store::{
    EventStore, PaymentInsert, RateLimitRecord, StoreResult, Subscriber, SubscriberStore,
    SubscriptionPayment,
};

/// Append-only rate limit log backed by a `Vec`.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    records: RwLock<Vec<RateLimitRecord>>,
}

impl InMemoryEventStore {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records in the log, regardless of window.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the log holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait::async_trait]
impl EventStore for InMemoryEventStore {
    async fn count_since(
        &self,
        user_id: &str,
        event_type: &str,
        window_start: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let records = self.records.read();
        let count = records
            .iter()
            .filter(|r| {
                r.user_id == user_id && r.event_type == event_type && r.timestamp >= window_start
            })
            .count();
        Ok(count as u64)
    }

    async fn record(
        &self,
        user_id: &str,
        event_type: &str,
        timestamp: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.records.write().push(RateLimitRecord {
            user_id: user_id.to_string(),
            event_type: event_type.to_string(),
            timestamp,
        });
        Ok(())
    }
}

/// Subscriber and payment tables backed by a map and a `Vec`.
#[derive(Debug, Default)]
pub struct InMemorySubscriberStore {
    subscribers: RwLock<HashMap<String, Subscriber>>,
    payments: RwLock<Vec<SubscriptionPayment>>,
}

impl InMemorySubscriberStore {
    /// Create empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a subscriber row, replacing any existing row with the same id.
    pub fn insert_subscriber(&self, subscriber: Subscriber) {
        self.subscribers
            .write()
            .insert(subscriber.id.clone(), subscriber);
    }

    /// Fetch a subscriber row by id.
    pub fn subscriber(&self, user_id: &str) -> Option<Subscriber> {
        self.subscribers.read().get(user_id).cloned()
    }

    /// Snapshot of all recorded payments.
    pub fn payments(&self) -> Vec<SubscriptionPayment> {
        self.payments.read().clone()
    }
}

#[async_trait::async_trait]
impl SubscriberStore for InMemorySubscriberStore {
    async fn link_stripe_customer(&self, user_id: &str, customer_id: &str) -> StoreResult<()> {
        let mut subscribers = self.subscribers.write();
        if let Some(subscriber) = subscribers.get_mut(user_id) {
            subscriber.stripe_customer_id = Some(customer_id.to_string());
            subscriber.has_active_subscription = true;
        } else {
            tracing::warn!(user_id, "checkout linked a customer to an unknown subscriber");
        }
        Ok(())
    }

    async fn find_user_by_customer(&self, customer_id: &str) -> StoreResult<Option<String>> {
        let subscribers = self.subscribers.read();
        Ok(subscribers
            .values()
            .find(|s| s.stripe_customer_id.as_deref() == Some(customer_id))
            .map(|s| s.id.clone()))
    }

    async fn set_active_subscription(&self, user_id: &str, active: bool) -> StoreResult<()> {
        let mut subscribers = self.subscribers.write();
        if let Some(subscriber) = subscribers.get_mut(user_id) {
            subscriber.has_active_subscription = active;
        }
        Ok(())
    }

    async fn insert_payment(&self, payment: SubscriptionPayment) -> StoreResult<PaymentInsert> {
        let mut payments = self.payments.write();
        if payments.iter().any(|p| p.invoice_id == payment.invoice_id) {
            return Ok(PaymentInsert::AlreadyRecorded);
        }
        payments.push(payment);
        Ok(PaymentInsert::Inserted)
    }
}
