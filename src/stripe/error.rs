//! Webhook Error Taxonomy
//!
//! The split that drives the endpoint's acknowledgment strategy:
//! *handled* failures are expected business conditions that must still be
//! acknowledged as received (the event source would otherwise redeliver,
//! and eventually disable the subscription); everything else is an
//! infrastructure failure worth a redelivery attempt.

use thiserror::Error;

use crate::store::StoreError;

/// Failures raised while processing a webhook event.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// An expected, non-retryable condition (missing metadata, unknown
    /// customer, draft invoice). Logged and acknowledged as received;
    /// redelivery would hit the same condition again.
    #[error("{0}")]
    Handled(String),

    /// The payload did not match the expected shape for its event type.
    /// Signature verification already passed, so this is a malformed but
    /// authentic delivery; redelivery cannot fix it.
    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// Infrastructure failure while applying the event. Surfaced to the
    /// event source as non-success so it retries delivery later.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Missing or unusable configuration.
    #[error("webhook configuration error: {0}")]
    Config(String),
}

impl WebhookError {
    /// Shorthand for a handled failure.
    pub fn handled(message: impl Into<String>) -> Self {
        WebhookError::Handled(message.into())
    }

    /// Whether the event source should be told the event was received.
    pub fn is_handled(&self) -> bool {
        matches!(self, WebhookError::Handled(_) | WebhookError::InvalidPayload(_))
    }
}

/// Result type alias for webhook processing.
pub type WebhookResult<T> = std::result::Result<T, WebhookError>;
