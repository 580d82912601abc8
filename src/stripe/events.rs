//! Stripe Event Types
//!
//! Strongly-typed representations of the webhook events this service
//! reconciles: checkout completion (which binds a Stripe customer to a
//! subscriber) and successful invoice payment (which records the charge).

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::stripe::error::{WebhookError, WebhookResult};

/// Stripe event types we handle
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StripeEventType {
    /// A checkout session initialized by this service was paid
    #[serde(rename = "checkout.session.completed")]
    CheckoutSessionCompleted,

    /// A subscription invoice was successfully charged
    #[serde(rename = "invoice.payment_succeeded")]
    InvoicePaymentSucceeded,

    /// Catch-all for events we don't explicitly handle
    #[serde(other)]
    Unknown,
}

impl FromStr for StripeEventType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            _ => Self::Unknown,
        })
    }
}

impl StripeEventType {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::Unknown => "unknown",
        }
    }

    /// Check if this is a known event type
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Generic Stripe event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeEvent {
    /// Unique identifier for the event
    pub id: String,

    /// Type of event
    #[serde(rename = "type")]
    pub event_type: String,

    /// Time of event creation (Unix timestamp)
    pub created: i64,

    /// API version used to render data
    #[serde(default)]
    pub api_version: Option<String>,

    /// Whether this is a live mode event
    #[serde(default)]
    pub livemode: bool,

    /// Number of times Stripe has attempted to deliver
    #[serde(default)]
    pub pending_webhooks: u32,

    /// Object containing event data
    pub data: EventData,
}

impl StripeEvent {
    /// Parse from raw JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> WebhookResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| WebhookError::InvalidPayload(e.to_string()))
    }

    /// Get the typed event type
    pub fn kind(&self) -> StripeEventType {
        // Infallible error type means this can never fail
        StripeEventType::from_str(&self.event_type).unwrap()
    }

    /// Extract the checkout session from event data
    pub fn as_checkout_session(&self) -> WebhookResult<CheckoutSession> {
        match self.kind() {
            StripeEventType::CheckoutSessionCompleted => {
                serde_json::from_value(self.data.object.clone())
                    .map_err(|e| WebhookError::InvalidPayload(e.to_string()))
            }
            _ => Err(WebhookError::InvalidPayload(format!(
                "Event {} is not a checkout session event",
                self.event_type
            ))),
        }
    }

    /// Extract the invoice from event data
    pub fn as_invoice(&self) -> WebhookResult<Invoice> {
        match self.kind() {
            StripeEventType::InvoicePaymentSucceeded => {
                serde_json::from_value(self.data.object.clone())
                    .map_err(|e| WebhookError::InvalidPayload(e.to_string()))
            }
            _ => Err(WebhookError::InvalidPayload(format!(
                "Event {} is not an invoice event",
                self.event_type
            ))),
        }
    }
}

/// Event data container
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    /// The actual event object (checkout session, invoice, etc.)
    pub object: serde_json::Value,
}

/// A reference to another Stripe object, either bare or expanded.
///
/// Stripe sends fields like `customer` as a plain id string unless the
/// caller asked for expansion, in which case the full object arrives
/// inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Expandable {
    /// Bare object id
    Id(String),
    /// Expanded object; only the id is retained
    Object {
        /// The referenced object's id
        id: String,
    },
}

impl Expandable {
    /// The referenced object's id, regardless of expansion.
    pub fn id(&self) -> &str {
        match self {
            Expandable::Id(id) => id,
            Expandable::Object { id } => id,
        }
    }
}

// =============================================================================
// Checkout Session Types
// =============================================================================

/// Stripe checkout session object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Session ID (cs_...)
    pub id: String,
    /// Customer the session created or reused, if any
    #[serde(default)]
    pub customer: Option<Expandable>,
    /// Metadata attached when the session was initialized
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Whether this is a live mode session
    #[serde(default)]
    pub livemode: bool,
}

impl CheckoutSession {
    /// The internal account id attached at checkout initialization.
    pub fn app_user_id(&self) -> Option<&str> {
        self.metadata.get("app_user_id").map(String::as_str)
    }

    /// The Stripe customer id, whether bare or expanded.
    pub fn customer_id(&self) -> Option<&str> {
        self.customer.as_ref().map(Expandable::id)
    }
}

// =============================================================================
// Invoice Types
// =============================================================================

/// Stripe invoice object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    /// Invoice ID (in_...); absent on upcoming draft invoices
    #[serde(default)]
    pub id: Option<String>,
    /// Customer the invoice was issued to
    #[serde(default)]
    pub customer: Option<Expandable>,
    /// Amount paid in the currency's minor unit
    pub amount_paid: i64,
    /// Currency code
    pub currency: String,
    /// Why the invoice was issued
    #[serde(default)]
    pub billing_reason: Option<String>,
    /// When created (Unix timestamp)
    pub created: i64,
    /// Invoice line items
    #[serde(default)]
    pub lines: InvoiceLines,
}

impl Invoice {
    /// The Stripe customer id, whether bare or expanded.
    pub fn customer_id(&self) -> Option<&str> {
        self.customer.as_ref().map(Expandable::id)
    }

    /// The billing period of the first line item, if present.
    pub fn first_period(&self) -> Option<&Period> {
        self.lines.data.first().and_then(|line| line.period.as_ref())
    }
}

/// Invoice line items container
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceLines {
    /// List of line items
    #[serde(default)]
    pub data: Vec<InvoiceLine>,
}

/// Individual invoice line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceLine {
    /// The billing period this line covers
    #[serde(default)]
    pub period: Option<Period>,
}

/// A billing period in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Period start (Unix timestamp)
    pub start: i64,
    /// Period end (Unix timestamp)
    pub end: i64,
}
