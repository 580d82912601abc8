//! Webhook endpoint integration tests
//!
//! Drives signed deliveries through the HTTP endpoint and checks the
//! acknowledgment contract (200 / 202 / 400) together with the state the
//! reconciler leaves behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use sha2::Sha256;
use tower::ServiceExt;

use bragfeed::retry::RetryPolicy;
use bragfeed::store::{
    InMemorySubscriberStore, PaymentInsert, StoreError, StoreResult, Subscriber, SubscriberStore,
    SubscriptionPayment,
};
use bragfeed::stripe::{stripe_webhook_router, StripeWebhookConfig, StripeWebhookState};

const SECRET: &str = "whsec_test_secret";

fn config() -> StripeWebhookConfig {
    StripeWebhookConfig {
        signing_secret: SECRET.to_string(),
        signature_tolerance: Duration::from_secs(300),
        customer_lookup: RetryPolicy::new(3, Duration::from_millis(10)),
    }
}

fn sign(payload: &str) -> String {
    let timestamp = Utc::now().timestamp();
    let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

fn delivery(payload: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/purchases/webhook")
        .header("stripe-signature", sign(payload))
        .body(Body::from(payload.to_string()))
        .unwrap()
}

fn checkout_payload(app_user_id: Option<&str>, customer: &str) -> String {
    let metadata = match app_user_id {
        Some(id) => serde_json::json!({ "app_user_id": id }),
        None => serde_json::json!({}),
    };
    serde_json::json!({
        "id": "evt_checkout_1",
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "livemode": false,
        "data": {
            "object": {
                "id": "cs_1",
                "customer": customer,
                "metadata": metadata
            }
        }
    })
    .to_string()
}

fn invoice_payload(invoice_id: &str, customer: &str, period: (i64, i64)) -> String {
    serde_json::json!({
        "id": "evt_invoice_1",
        "type": "invoice.payment_succeeded",
        "created": 1614556800,
        "livemode": false,
        "data": {
            "object": {
                "id": invoice_id,
                "customer": customer,
                "amount_paid": 2000,
                "currency": "usd",
                "billing_reason": "subscription_create",
                "created": 1614556800,
                "lines": {
                    "data": [{"period": {"start": period.0, "end": period.1}}]
                }
            }
        }
    })
    .to_string()
}

fn app_with(store: Arc<InMemorySubscriberStore>) -> axum::Router {
    stripe_webhook_router(Arc::new(StripeWebhookState::new(&config(), store)))
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_checkout_then_invoice_records_payment() {
    let store = Arc::new(InMemorySubscriberStore::new());
    store.insert_subscriber(Subscriber::new("u1"));
    let app = app_with(store.clone());

    let response = app
        .clone()
        .oneshot(delivery(&checkout_payload(Some("u1"), "cus_1")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"received": true}));

    let response = app
        .oneshot(delivery(&invoice_payload("in_1", "cus_1", (1000, 2000))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let subscriber = store.subscriber("u1").unwrap();
    assert_eq!(subscriber.stripe_customer_id.as_deref(), Some("cus_1"));
    assert!(subscriber.has_active_subscription);

    let payments = store.payments();
    assert_eq!(payments.len(), 1);
    let payment = &payments[0];
    assert_eq!(payment.invoice_id, "in_1");
    assert_eq!(payment.user_id, "u1");
    assert_eq!(payment.amount, 2000);
    assert_eq!(payment.currency, "usd");
    assert_eq!(
        payment.subscription_start,
        DateTime::<Utc>::from_timestamp(1000, 0).unwrap()
    );
    assert_eq!(
        payment.subscription_end,
        DateTime::<Utc>::from_timestamp(2000, 0).unwrap()
    );
}

#[tokio::test]
async fn test_invoice_arriving_first_resolves_within_polling_window() {
    let store = Arc::new(InMemorySubscriberStore::new());
    store.insert_subscriber(Subscriber::new("u1"));

    let webhook_config = StripeWebhookConfig {
        customer_lookup: RetryPolicy::new(20, Duration::from_millis(25)),
        ..config()
    };
    let app = stripe_webhook_router(Arc::new(StripeWebhookState::new(
        &webhook_config,
        store.clone() as Arc<dyn SubscriberStore>,
    )));

    // The checkout write lands while the invoice handler is polling.
    let linker = store.clone();
    let link_task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        linker.link_stripe_customer("u1", "cus_1").await.unwrap();
    });

    let response = app
        .oneshot(delivery(&invoice_payload("in_1", "cus_1", (1000, 2000))))
        .await
        .unwrap();
    link_task.await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.payments().len(), 1);
}

#[tokio::test]
async fn test_unresolvable_customer_acknowledged_after_polling() {
    let store = Arc::new(InMemorySubscriberStore::new());
    let app = app_with(store.clone());

    // No subscriber ever binds cus_missing; polling exhausts, but the
    // delivery is still acknowledged so the source does not redeliver.
    let response = app
        .oneshot(delivery(&invoice_payload("in_1", "cus_missing", (1000, 2000))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(store.payments().is_empty());
}

#[tokio::test]
async fn test_checkout_without_metadata_acknowledged_without_mutation() {
    let store = Arc::new(InMemorySubscriberStore::new());
    store.insert_subscriber(Subscriber::new("u1"));
    let app = app_with(store.clone());

    let response = app
        .oneshot(delivery(&checkout_payload(None, "cus_1")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let subscriber = store.subscriber("u1").unwrap();
    assert_eq!(subscriber.stripe_customer_id, None);
    assert!(!subscriber.has_active_subscription);
}

#[tokio::test]
async fn test_redelivered_invoice_records_single_payment() {
    let store = Arc::new(InMemorySubscriberStore::new());
    store.insert_subscriber(Subscriber::new("u1"));
    let app = app_with(store.clone());

    app.clone()
        .oneshot(delivery(&checkout_payload(Some("u1"), "cus_1")))
        .await
        .unwrap();

    let payload = invoice_payload("in_1", "cus_1", (1000, 2000));
    for _ in 0..2 {
        let response = app.clone().oneshot(delivery(&payload)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(store.payments().len(), 1);
}

#[tokio::test]
async fn test_unknown_event_acknowledged_as_noop() {
    let store = Arc::new(InMemorySubscriberStore::new());
    let app = app_with(store);

    let payload = serde_json::json!({
        "id": "evt_1",
        "type": "customer.subscription.updated",
        "created": Utc::now().timestamp(),
        "data": {"object": {}}
    })
    .to_string();

    let response = app.oneshot(delivery(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, serde_json::json!({"received": true}));
}

#[tokio::test]
async fn test_missing_signature_rejected_before_dispatch() {
    let store = Arc::new(InMemorySubscriberStore::new());
    store.insert_subscriber(Subscriber::new("u1"));
    let app = app_with(store.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/api/purchases/webhook")
        .body(Body::from(checkout_payload(Some("u1"), "cus_1")))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!store.subscriber("u1").unwrap().has_active_subscription);
}

#[tokio::test]
async fn test_tampered_payload_rejected_before_dispatch() {
    let store = Arc::new(InMemorySubscriberStore::new());
    store.insert_subscriber(Subscriber::new("u1"));
    let app = app_with(store.clone());

    let payload = checkout_payload(Some("u1"), "cus_1");
    let request = Request::builder()
        .method("POST")
        .uri("/api/purchases/webhook")
        .header("stripe-signature", sign("different payload"))
        .body(Body::from(payload))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(!store.subscriber("u1").unwrap().has_active_subscription);
}

/// Subscriber store whose failure mode can be toggled, for recovery
/// coverage.
struct FlakySubscriberStore {
    inner: InMemorySubscriberStore,
    failing: AtomicBool,
}

impl FlakySubscriberStore {
    fn new() -> Self {
        Self {
            inner: InMemorySubscriberStore::new(),
            failing: AtomicBool::new(false),
        }
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl SubscriberStore for FlakySubscriberStore {
    async fn link_stripe_customer(&self, user_id: &str, customer_id: &str) -> StoreResult<()> {
        self.check()?;
        self.inner.link_stripe_customer(user_id, customer_id).await
    }

    async fn find_user_by_customer(&self, customer_id: &str) -> StoreResult<Option<String>> {
        self.check()?;
        self.inner.find_user_by_customer(customer_id).await
    }

    async fn set_active_subscription(&self, user_id: &str, active: bool) -> StoreResult<()> {
        self.check()?;
        self.inner.set_active_subscription(user_id, active).await
    }

    async fn insert_payment(&self, payment: SubscriptionPayment) -> StoreResult<PaymentInsert> {
        self.check()?;
        self.inner.insert_payment(payment).await
    }
}

#[tokio::test]
async fn test_store_failure_yields_202_then_redelivery_succeeds() {
    let store = Arc::new(FlakySubscriberStore::new());
    store.inner.insert_subscriber(Subscriber::new("u1"));
    let app = stripe_webhook_router(Arc::new(StripeWebhookState::new(
        &config(),
        store.clone() as Arc<dyn SubscriberStore>,
    )));

    let payload = checkout_payload(Some("u1"), "cus_1");

    store.set_failing(true);
    let response = app.clone().oneshot(delivery(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(!store.inner.subscriber("u1").unwrap().has_active_subscription);

    // The event source redelivers once the store is back.
    store.set_failing(false);
    let response = app.oneshot(delivery(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(store.inner.subscriber("u1").unwrap().has_active_subscription);
}
