//! Webhook HTTP Endpoint
//!
//! Validates the delivery transport, then hands the event to the
//! reconciler and maps its outcome onto the acknowledgment contract the
//! event source expects:
//!
//! ```text
//! Request ──▶ signature check ──▶ parse ──▶ reconciler.handle
//!    │              │               │            │
//!    ▼              ▼               ▼            ▼
//!  400 missing    400 bad        400 bad    200 processed / ignored
//!                                           200 handled failure
//!                                           202 unexpected failure
//! ```
//!
//! 202 rather than 500 for unexpected failures: the source retries on any
//! non-2xx-success it treats as transient, but a stream of hard 5xx
//! responses eventually gets the webhook subscription disabled. 202
//! signals non-success for observability while staying below that
//! threshold.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, warn};

use crate::metrics::global_metrics;
use crate::store::SubscriberStore;
use crate::stripe::config::StripeWebhookConfig;
use crate::stripe::events::StripeEvent;
use crate::stripe::reconciler::{WebhookOutcome, WebhookReconciler};
use crate::stripe::signature::SignatureVerifier;

/// Shared state for the webhook endpoint.
pub struct StripeWebhookState {
    /// Signature verifier for inbound deliveries
    pub verifier: SignatureVerifier,
    /// Reconciler applying verified events
    pub reconciler: WebhookReconciler,
}

impl StripeWebhookState {
    /// Wire the endpoint state from config and a subscriber store.
    pub fn new(config: &StripeWebhookConfig, subscribers: Arc<dyn SubscriberStore>) -> Self {
        Self {
            verifier: SignatureVerifier::new(
                config.signing_secret.as_bytes().to_vec(),
                config.signature_tolerance,
            ),
            reconciler: WebhookReconciler::new(subscribers)
                .with_customer_lookup(config.customer_lookup),
        }
    }
}

/// Router exposing `POST /api/purchases/webhook`.
pub fn stripe_webhook_router(state: Arc<StripeWebhookState>) -> Router {
    Router::new()
        .route("/api/purchases/webhook", post(stripe_webhook_handler))
        .with_state(state)
}

/// The webhook endpoint handler.
pub async fn stripe_webhook_handler(
    State(state): State<Arc<StripeWebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = match headers.get("stripe-signature").and_then(|v| v.to_str().ok()) {
        Some(signature) => signature,
        None => {
            error!("missing stripe signature header");
            return bad_request("Missing Stripe signature");
        }
    };

    if let Err(err) = state.verifier.verify(signature, &body) {
        error!(error = %err, "webhook signature verification failed");
        return bad_request("Webhook signature verification failed");
    }

    let event = match StripeEvent::from_bytes(&body) {
        Ok(event) => event,
        Err(err) => {
            error!(error = %err, "webhook payload did not parse");
            return bad_request("Invalid webhook payload");
        }
    };

    global_metrics().record_webhook_received();

    match state.reconciler.handle(&event).await {
        Ok(WebhookOutcome::Processed) => {
            global_metrics().record_webhook_processed();
            received()
        }
        Ok(WebhookOutcome::Ignored) => {
            global_metrics().record_webhook_ignored();
            received()
        }
        Err(err) if err.is_handled() => {
            // Expected condition: acknowledge so the source neither
            // redelivers nor disables the subscription.
            warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %err,
                "handled webhook failure"
            );
            global_metrics().record_webhook_handled_failure();
            received()
        }
        Err(err) => {
            error!(
                event_id = %event.id,
                event_type = %event.event_type,
                error = %err,
                "webhook processing failed"
            );
            global_metrics().record_webhook_unexpected_failure();
            (
                StatusCode::ACCEPTED,
                Json(json!({ "error": format!("Failed to handle event {}", event.event_type) })),
            )
                .into_response()
        }
    }
}

fn received() -> Response {
    (StatusCode::OK, Json(json!({ "received": true }))).into_response()
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}
