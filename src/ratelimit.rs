//! Event Rate Limiting
//!
//! A sliding-window admission gate keyed by (user, event type) and backed
//! by the durable event log. Each admitted request appends one record;
//! admission counts existing records inside a trailing window ending at
//! "now".
//!
//! # Architecture
//!
//! ```text
//! Request ──▶ admit(user, config) ──▶ count records in [now - window, now]
//!                   │                        │
//!                   │                 count < max ──▶ append record ──▶ Admitted
//!                   │                 count ≥ max ──▶ Rejected {retry_after}
//!                   │                 store error ──▶ DegradedAdmitted
//!                   ▼
//!             multiple limits chain via admit_all (first rejection wins)
//! ```
//!
//! The read and the write are not wrapped in a transaction: two calls
//! racing near the boundary can both observe count = max − 1 and both
//! append, over-admitting by one. That imprecision is accepted in
//! exchange for never locking the hot path.
//!
//! On store failure the gate fails open: an outage degrades limiting
//! accuracy, never availability. Degraded admissions carry their own
//! `Decision` variant so the mode stays observable.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::EventStore;

/// One limit: which action it gates, how many, over what window.
///
/// Configs are supplied by the endpoint composing the limiter; the same
/// endpoint may chain several (a daily cap and a burst cap, say) under
/// distinct event type tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Tag identifying the limited action (e.g. "fetch_reviews")
    pub event_type: String,
    /// Maximum admitted requests per window
    pub max_requests: u32,
    /// Trailing window length
    pub window: Duration,
}

impl RateLimitConfig {
    /// Create a limit config.
    pub fn new(event_type: impl Into<String>, max_requests: u32, window: Duration) -> Self {
        Self {
            event_type: event_type.into(),
            max_requests,
            window,
        }
    }

    /// The window length in whole seconds, as surfaced in retry hints.
    pub fn window_secs(&self) -> u64 {
        (self.window.as_millis() as f64 / 1000.0).round() as u64
    }
}

/// Outcome of one admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Under the limit; one record was appended
    Admitted,
    /// The store failed, so the gate failed open; nothing was recorded
    DegradedAdmitted,
    /// At or over the limit; nothing was recorded
    Rejected {
        /// How long the caller should wait before retrying
        retry_after: Duration,
    },
}

impl Decision {
    /// Whether the request may proceed.
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Decision::Rejected { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Admitted => write!(f, "admitted"),
            Decision::DegradedAdmitted => write!(f, "admitted (degraded)"),
            Decision::Rejected { retry_after } => {
                write!(f, "rejected (retry after {}s)", retry_after.as_secs())
            }
        }
    }
}

/// JSON body returned with HTTP 429 when a limit rejects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRejection {
    /// Machine-readable error tag
    pub error: String,
    /// Human-readable description naming the limit
    pub message: String,
    /// Seconds to wait before retrying
    #[serde(rename = "retryAfter")]
    pub retry_after: u64,
}

impl RateLimitRejection {
    /// Build the rejection body for the limit that tripped.
    pub fn for_config(config: &RateLimitConfig) -> Self {
        let secs = config.window_secs();
        Self {
            error: "Rate limit exceeded".to_string(),
            message: format!(
                "Too many {} requests. Limit: {} per {} seconds",
                config.event_type, config.max_requests, secs
            ),
            retry_after: secs,
        }
    }
}

/// Sliding-window admission gate over the durable event log.
#[derive(Clone)]
pub struct EventRateLimiter {
    store: Arc<dyn EventStore>,
}

impl EventRateLimiter {
    /// Create a limiter over the given log.
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Check one limit and record the request if admitted.
    ///
    /// Exactly one durable write per admission, zero per rejection. A
    /// store failure on either the count or the write fails open.
    pub async fn admit(&self, user_id: &str, config: &RateLimitConfig) -> Decision {
        let now = Utc::now();
        let window_start = now - chrono::Duration::milliseconds(config.window.as_millis() as i64);

        let count = match self
            .store
            .count_since(user_id, &config.event_type, window_start)
            .await
        {
            Ok(count) => count,
            Err(error) => {
                warn!(
                    user_id,
                    event_type = %config.event_type,
                    %error,
                    "rate limit count failed, admitting without a record"
                );
                return Decision::DegradedAdmitted;
            }
        };

        if count >= u64::from(config.max_requests) {
            return Decision::Rejected {
                retry_after: config.window,
            };
        }

        if let Err(error) = self.store.record(user_id, &config.event_type, now).await {
            warn!(
                user_id,
                event_type = %config.event_type,
                %error,
                "rate limit record failed, admitting without a record"
            );
            return Decision::DegradedAdmitted;
        }

        Decision::Admitted
    }

    /// Evaluate several limits in order, stopping at the first rejection.
    ///
    /// Each limit is checked independently; records appended by limits
    /// earlier in the chain persist even when a later limit rejects,
    /// matching the behavior of nested per-limit gates.
    pub async fn admit_all<'c>(
        &self,
        user_id: &str,
        configs: &'c [RateLimitConfig],
    ) -> Result<Decision, &'c RateLimitConfig> {
        let mut decision = Decision::Admitted;
        for config in configs {
            match self.admit(user_id, config).await {
                Decision::Rejected { .. } => return Err(config),
                Decision::DegradedAdmitted => decision = Decision::DegradedAdmitted,
                Decision::Admitted => {}
            }
        }
        Ok(decision)
    }
}
