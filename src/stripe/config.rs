//! Webhook Configuration
//!
//! All sensitive values come from environment variables; nothing is
//! hardcoded. The customer lookup policy defaults match the delivery
//! characteristics of the event source: checkout and invoice events fire
//! in order but their handlers race, so the invoice side waits up to
//! ~5 seconds for the checkout write to become visible.

use std::env;
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::stripe::error::{WebhookError, WebhookResult};
use crate::stripe::signature::DEFAULT_TOLERANCE;

/// Attempts made to resolve a Stripe customer to a subscriber.
pub const CUSTOMER_LOOKUP_ATTEMPTS: u32 = 20;

/// Pause between customer lookup attempts.
pub const CUSTOMER_LOOKUP_INTERVAL: Duration = Duration::from_millis(250);

/// Configuration for the webhook endpoint.
#[derive(Debug, Clone)]
pub struct StripeWebhookConfig {
    /// Shared signing secret for `stripe-signature` verification
    pub signing_secret: String,

    /// Allowed skew between signature timestamp and the local clock
    pub signature_tolerance: Duration,

    /// Polling policy for resolving a customer id to a subscriber
    pub customer_lookup: RetryPolicy,
}

impl StripeWebhookConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `BRAGFEED_STRIPE_WEBHOOK_SECRET` (required): webhook signing secret
    /// - `BRAGFEED_STRIPE_SIG_TOLERANCE_SECS` (optional): signature
    ///   timestamp tolerance in seconds (default: 300)
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Config` when the secret is unset or empty,
    /// or when the tolerance does not parse.
    pub fn from_env() -> WebhookResult<Self> {
        let signing_secret = env::var("BRAGFEED_STRIPE_WEBHOOK_SECRET").map_err(|_| {
            WebhookError::Config("BRAGFEED_STRIPE_WEBHOOK_SECRET environment variable not set".to_string())
        })?;

        if signing_secret.is_empty() {
            return Err(WebhookError::Config(
                "webhook signing secret cannot be empty".to_string(),
            ));
        }

        let signature_tolerance = match env::var("BRAGFEED_STRIPE_SIG_TOLERANCE_SECS") {
            Ok(value) => {
                let secs = value.parse::<u64>().map_err(|e| {
                    WebhookError::Config(format!("invalid signature tolerance: {}", e))
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => DEFAULT_TOLERANCE,
        };

        Ok(Self {
            signing_secret,
            signature_tolerance,
            customer_lookup: RetryPolicy::new(CUSTOMER_LOOKUP_ATTEMPTS, CUSTOMER_LOOKUP_INTERVAL),
        })
    }

    /// Create a test configuration (for testing only)
    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            signing_secret: "whsec_test_secret".to_string(),
            signature_tolerance: DEFAULT_TOLERANCE,
            customer_lookup: RetryPolicy::new(3, Duration::from_millis(10)),
        }
    }
}
