//! HTTP Server Assembly
//!
//! Wires the rate limiter, review source, and webhook endpoint into one
//! axum router:
//!
//! ```text
//! GET  /health                  liveness probe
//! GET  /status                  uptime + counters
//! GET  /metrics                 Prometheus text format
//! POST /api/reviews/fetch       rate-limited review feed
//! POST /api/purchases/webhook   Stripe webhook endpoint
//! ```
//!
//! The feed route runs each request through the chained limits before
//! touching the review source; a rejection short-circuits into a 429
//! carrying a machine-readable retry hint.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::cors::public_feed_layer;
use crate::handlers::status::{health_handler, metrics_handler, status_handler};
use crate::metrics::global_metrics;
use crate::ratelimit::{Decision, EventRateLimiter, RateLimitConfig, RateLimitRejection};
use crate::reviews::{ReviewRecord, ReviewSource};
use crate::store::{EventStore, SubscriberStore};
use crate::stripe::{stripe_webhook_router, StripeWebhookState};

/// Daily cap on review feed fetches per user.
pub const FETCH_DAILY_MAX: u32 = 100;

/// Burst cap on review feed fetches per user (15 minute window).
pub const FETCH_BURST_MAX: u32 = 10;

/// Shared state behind the feed routes.
#[derive(Clone)]
pub struct AppState {
    /// Rate limit gate over the durable event log
    pub limiter: EventRateLimiter,
    /// Subscriber billing state
    pub subscribers: Arc<dyn SubscriberStore>,
    /// Opaque source of review records
    pub reviews: Arc<dyn ReviewSource>,
    /// Limits applied to the feed route, in evaluation order
    pub fetch_limits: Arc<Vec<RateLimitConfig>>,
}

impl AppState {
    /// Build state over the given backends with the default feed limits.
    pub fn new(
        events: Arc<dyn EventStore>,
        subscribers: Arc<dyn SubscriberStore>,
        reviews: Arc<dyn ReviewSource>,
    ) -> Self {
        Self {
            limiter: EventRateLimiter::new(events),
            subscribers,
            reviews,
            fetch_limits: Arc::new(default_fetch_limits()),
        }
    }

    /// Replace the feed limits (used to tighten windows in tests).
    pub fn with_fetch_limits(mut self, limits: Vec<RateLimitConfig>) -> Self {
        self.fetch_limits = Arc::new(limits);
        self
    }
}

/// The limits guarding the feed route: a daily cap and a burst cap,
/// evaluated in that order.
pub fn default_fetch_limits() -> Vec<RateLimitConfig> {
    vec![
        RateLimitConfig::new(
            "fetch_reviews",
            FETCH_DAILY_MAX,
            Duration::from_secs(24 * 60 * 60),
        ),
        RateLimitConfig::new("fetch_reviews_burst", FETCH_BURST_MAX, Duration::from_secs(15 * 60)),
    ]
}

/// Request body for the feed route.
///
/// Authentication happens upstream; the caller passes the authenticated
/// user id through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchReviewsRequest {
    /// The authenticated user making the request
    pub user_id: String,
    /// The business whose reviews to fetch
    pub business_id: String,
}

/// Response body for the feed route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchReviewsResponse {
    /// Reviews currently known for the business
    pub reviews: Vec<ReviewRecord>,
}

/// `POST /api/reviews/fetch`
pub async fn fetch_reviews_handler(
    State(state): State<AppState>,
    Json(request): Json<FetchReviewsRequest>,
) -> Response {
    if request.user_id.is_empty() || request.business_id.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "user_id and business_id are required" })),
        )
            .into_response();
    }

    match state
        .limiter
        .admit_all(&request.user_id, &state.fetch_limits)
        .await
    {
        Err(config) => {
            global_metrics().record_decision(&Decision::Rejected {
                retry_after: config.window,
            });
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(RateLimitRejection::for_config(config)),
            )
                .into_response()
        }
        Ok(decision) => {
            global_metrics().record_decision(&decision);
            match state.reviews.reviews_for_business(&request.business_id).await {
                Ok(reviews) => Json(FetchReviewsResponse { reviews }).into_response(),
                Err(err) => {
                    error!(
                        business_id = %request.business_id,
                        error = %err,
                        "review fetch failed"
                    );
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": "Something went wrong" })),
                    )
                        .into_response()
                }
            }
        }
    }
}

/// Assemble the full application router.
pub fn router(state: AppState, webhook: Arc<StripeWebhookState>) -> Router {
    let feed = Router::new()
        .route("/api/reviews/fetch", post(fetch_reviews_handler))
        .layer(public_feed_layer())
        .with_state(state);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .merge(feed)
        .merge(stripe_webhook_router(webhook))
}

/// Bind and serve until shutdown.
pub async fn serve(addr: SocketAddr, app: Router) -> crate::error::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "bragfeed api listening");
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::reviews::StaticReviewSource;
    use crate::store::{InMemoryEventStore, InMemorySubscriberStore};
    use crate::stripe::StripeWebhookConfig;

    fn test_router(limits: Vec<RateLimitConfig>) -> Router {
        let subscribers = Arc::new(InMemorySubscriberStore::new());
        let reviews = Arc::new(StaticReviewSource::new());
        reviews.add_review("biz_1", "Ada", 5, "Brilliant");

        let state = AppState::new(
            Arc::new(InMemoryEventStore::new()),
            subscribers.clone(),
            reviews,
        )
        .with_fetch_limits(limits);

        let config = StripeWebhookConfig::test_config();
        let webhook = Arc::new(StripeWebhookState::new(&config, subscribers));
        router(state, webhook)
    }

    fn fetch_request(user_id: &str) -> Request<Body> {
        let body = serde_json::to_string(&FetchReviewsRequest {
            user_id: user_id.to_string(),
            business_id: "biz_1".to_string(),
        })
        .unwrap();
        Request::builder()
            .method("POST")
            .uri("/api/reviews/fetch")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = test_router(default_fetch_limits());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_feed_admits_then_rejects_with_429_body() {
        let limits = vec![RateLimitConfig::new(
            "fetch_reviews",
            2,
            Duration::from_secs(60),
        )];
        let app = test_router(limits);

        for _ in 0..2 {
            let response = app.clone().oneshot(fetch_request("u1")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.oneshot(fetch_request("u1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: RateLimitRejection = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.error, "Rate limit exceeded");
        assert_eq!(body.retry_after, 60);
        assert!(body.message.contains("fetch_reviews"));
    }

    #[tokio::test]
    async fn test_feed_rejects_empty_identity() {
        let app = test_router(default_fetch_limits());
        let response = app.oneshot(fetch_request("")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
