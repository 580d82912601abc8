//! Webhook Reconciliation
//!
//! Applies billing lifecycle events to subscriber state, exactly one
//! handler per delivery, selected by a fixed match on the event kind.
//! Handlers never invoke each other.
//!
//! Two event kinds matter:
//!
//! - `checkout.session.completed` binds the Stripe customer identity to
//!   an internal subscriber and activates the subscription. This is the
//!   linking step every later event depends on.
//! - `invoice.payment_succeeded` records the charge and re-activates the
//!   subscription. It may arrive before the checkout handler's write is
//!   visible, so the subscriber lookup polls before giving up.
//!
//! The same event can be delivered more than once. Re-processing is safe:
//! the checkout update is naturally idempotent, and payments are keyed by
//! invoice id, so a redelivered invoice records nothing new.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::retry::{poll_until_some, RetryPolicy};
use crate::store::{PaymentInsert, SubscriberStore, SubscriptionPayment};
use crate::stripe::config::{CUSTOMER_LOOKUP_ATTEMPTS, CUSTOMER_LOOKUP_INTERVAL};
use crate::stripe::error::{WebhookError, WebhookResult};
use crate::stripe::events::{StripeEvent, StripeEventType};

/// What a delivery amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A handler ran and applied the event
    Processed,
    /// No handler is registered for this event kind; acknowledged as a no-op
    Ignored,
}

/// Applies verified billing events to the subscriber store.
pub struct WebhookReconciler {
    subscribers: Arc<dyn SubscriberStore>,
    customer_lookup: RetryPolicy,
}

impl WebhookReconciler {
    /// Create a reconciler with the default customer lookup policy.
    pub fn new(subscribers: Arc<dyn SubscriberStore>) -> Self {
        Self {
            subscribers,
            customer_lookup: RetryPolicy::new(CUSTOMER_LOOKUP_ATTEMPTS, CUSTOMER_LOOKUP_INTERVAL),
        }
    }

    /// Override the customer lookup policy.
    pub fn with_customer_lookup(mut self, policy: RetryPolicy) -> Self {
        self.customer_lookup = policy;
        self
    }

    /// Process one delivered event.
    ///
    /// Dispatches on the typed event kind. Unknown kinds return
    /// `Ignored`, never an error.
    pub async fn handle(&self, event: &StripeEvent) -> WebhookResult<WebhookOutcome> {
        match event.kind() {
            StripeEventType::CheckoutSessionCompleted => {
                info!(event_id = %event.id, event_type = %event.event_type, "handling event");
                self.on_checkout_session_completed(event).await?;
                Ok(WebhookOutcome::Processed)
            }
            StripeEventType::InvoicePaymentSucceeded => {
                info!(event_id = %event.id, event_type = %event.event_type, "handling event");
                self.on_invoice_payment_succeeded(event).await?;
                Ok(WebhookOutcome::Processed)
            }
            StripeEventType::Unknown => {
                warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    "no handler registered for event type"
                );
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    /// Bind the Stripe customer to the subscriber named in the session
    /// metadata and activate the subscription.
    async fn on_checkout_session_completed(&self, event: &StripeEvent) -> WebhookResult<()> {
        let session = event.as_checkout_session()?;

        // Without the metadata we have a paid checkout that cannot be
        // attributed to any account.
        let app_user_id = session.app_user_id().ok_or_else(|| {
            WebhookError::handled(
                "checkout session completed without app_user_id metadata, cannot link to subscriber",
            )
        })?;

        let customer_id = session.customer_id().ok_or_else(|| {
            WebhookError::handled(
                "checkout session completed without a valid customer id, cannot link to subscriber",
            )
        })?;

        self.subscribers
            .link_stripe_customer(app_user_id, customer_id)
            .await?;

        info!(
            user_id = %app_user_id,
            customer_id = %customer_id,
            "linked stripe customer and activated subscription"
        );
        Ok(())
    }

    /// Record the paid invoice against the subscriber the customer id
    /// resolves to, and mark the subscription active.
    async fn on_invoice_payment_succeeded(&self, event: &StripeEvent) -> WebhookResult<()> {
        let invoice = event.as_invoice()?;

        let customer_id = invoice
            .customer_id()
            .ok_or_else(|| {
                WebhookError::handled("invoice is missing a customer id, cannot process payment")
            })?
            .to_string();

        let invoice_id = invoice.id.clone().ok_or_else(|| {
            WebhookError::handled("invoice has no id and is an upcoming draft, payment not recorded")
        })?;

        // The checkout handler may still be writing the customer binding
        // when this event arrives; poll until the write is visible.
        let user_id = poll_until_some(self.customer_lookup, || {
            self.subscribers.find_user_by_customer(&customer_id)
        })
        .await?
        .ok_or_else(|| {
            WebhookError::handled(format!(
                "no subscriber found for stripe customer {}",
                customer_id
            ))
        })?;

        let period = invoice.first_period().copied().ok_or_else(|| {
            WebhookError::handled("invoice line item is missing a billing period")
        })?;

        let payment = SubscriptionPayment {
            user_id: user_id.clone(),
            stripe_customer_id: customer_id,
            invoice_id: invoice_id.clone(),
            amount: invoice.amount_paid,
            currency: invoice.currency.clone(),
            billing_reason: invoice.billing_reason.clone(),
            subscription_start: timestamp(period.start)?,
            subscription_end: timestamp(period.end)?,
            created_at: timestamp(invoice.created)?,
        };

        match self.subscribers.insert_payment(payment).await? {
            PaymentInsert::Inserted => {
                info!(user_id = %user_id, invoice_id = %invoice_id, "recorded subscription payment");
            }
            PaymentInsert::AlreadyRecorded => {
                warn!(
                    user_id = %user_id,
                    invoice_id = %invoice_id,
                    "duplicate delivery, payment already recorded"
                );
            }
        }

        self.subscribers
            .set_active_subscription(&user_id, true)
            .await?;
        Ok(())
    }
}

/// Convert epoch seconds to a UTC instant.
fn timestamp(secs: i64) -> WebhookResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| WebhookError::handled(format!("timestamp {} out of range", secs)))
}
