//! Stripe gateway retry behavior against a local fake provider.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;

use billing_reconciler::adapters::stripe::{RetryPolicy, StripeConfig, StripeGateway};
use billing_reconciler::domain::foundation::UserId;
use billing_reconciler::ports::{CreateSubscriptionRequest, PaymentErrorCode, PaymentGateway};

// ════════════════════════════════════════════════════════════════════════════════
// Fake Provider
// ════════════════════════════════════════════════════════════════════════════════

/// Answers with `script` in order, then succeeds.
#[derive(Clone, Default)]
struct FakeProvider {
    script: Arc<Mutex<Vec<(StatusCode, serde_json::Value)>>>,
    attempts: Arc<AtomicUsize>,
    idempotency_keys: Arc<Mutex<Vec<Option<String>>>>,
}

impl FakeProvider {
    fn scripted(responses: Vec<(StatusCode, serde_json::Value)>) -> Self {
        Self {
            script: Arc::new(Mutex::new(responses)),
            ..Self::default()
        }
    }

    fn record(&self, headers: &HeaderMap) -> Option<Response> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.idempotency_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(
                headers
                    .get("Idempotency-Key")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string),
            );
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        if script.is_empty() {
            None
        } else {
            let (status, body) = script.remove(0);
            Some((status, Json(body)).into_response())
        }
    }

    fn keys(&self) -> Vec<Option<String>> {
        self.idempotency_keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

async fn create_subscription(State(fake): State<FakeProvider>, headers: HeaderMap) -> Response {
    fake.record(&headers).unwrap_or_else(|| {
        Json(json!({
            "id": "sub_remote",
            "status": "incomplete",
            "current_period_start": 1_700_000_000,
            "current_period_end": 1_702_592_000,
            "latest_invoice": { "payment_intent": { "client_secret": "pi_secret" } }
        }))
        .into_response()
    })
}

async fn cancel_subscription(
    State(fake): State<FakeProvider>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    fake.record(&headers)
        .unwrap_or_else(|| Json(json!({ "id": id, "status": "canceled" })).into_response())
}

async fn serve(fake: FakeProvider) -> String {
    let app = Router::new()
        .route("/v1/subscriptions", post(create_subscription))
        .route("/v1/subscriptions/:id", delete(cancel_subscription))
        .with_state(fake);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn gateway(base_url: String) -> StripeGateway {
    let retry = RetryPolicy::default()
        .with_initial_interval(Duration::from_millis(5))
        .with_max_interval(Duration::from_millis(20))
        .with_max_elapsed(Duration::from_secs(2));
    StripeGateway::new(
        StripeConfig::new("sk_test_fake")
            .with_base_url(base_url)
            .with_timeout(Duration::from_secs(2))
            .with_retry_policy(retry),
    )
    .unwrap()
}

fn create_request(key: &str) -> CreateSubscriptionRequest {
    CreateSubscriptionRequest {
        customer_id: "cus_1".to_string(),
        plan_id: "price_pro".to_string(),
        user_id: UserId::new("user-1").unwrap(),
        idempotency_key: key.to_string(),
    }
}

fn rate_limited() -> (StatusCode, serde_json::Value) {
    (
        StatusCode::TOO_MANY_REQUESTS,
        json!({ "error": { "type": "rate_limit_error", "message": "Too many requests" } }),
    )
}

// ════════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn rate_limited_create_is_retried_with_the_same_key() {
    let fake = FakeProvider::scripted(vec![rate_limited(), rate_limited(), rate_limited()]);
    let gateway = gateway(serve(fake.clone()).await);

    let created = gateway
        .create_subscription(create_request("create-user-1-abc"))
        .await
        .unwrap();

    assert_eq!(created.external_id, "sub_remote");
    assert_eq!(created.client_secret.as_deref(), Some("pi_secret"));
    assert_eq!(fake.attempts.load(Ordering::SeqCst), 4);
    assert!(fake
        .keys()
        .iter()
        .all(|k| k.as_deref() == Some("create-user-1-abc")));
}

#[tokio::test]
async fn declined_card_is_not_retried() {
    let fake = FakeProvider::scripted(vec![(
        StatusCode::PAYMENT_REQUIRED,
        json!({ "error": {
            "type": "card_error",
            "code": "card_declined",
            "message": "Your card was declined."
        }}),
    )]);
    let gateway = gateway(serve(fake.clone()).await);

    let err = gateway
        .create_subscription(create_request("create-user-1-def"))
        .await
        .unwrap_err();

    assert_eq!(err.code, PaymentErrorCode::CardDeclined);
    assert!(!err.retryable);
    assert_eq!(fake.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn persistent_outage_gives_up_within_budget() {
    let outage = (
        StatusCode::SERVICE_UNAVAILABLE,
        json!({ "error": { "type": "api_error", "message": "down" } }),
    );
    let fake = FakeProvider::scripted(vec![outage; 500]);
    let gateway = gateway(serve(fake.clone()).await);

    let started = std::time::Instant::now();
    let err = gateway
        .create_subscription(create_request("create-user-1-ghi"))
        .await
        .unwrap_err();

    assert_eq!(err.code, PaymentErrorCode::ProviderUnavailable);
    assert!(fake.attempts.load(Ordering::SeqCst) > 1);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn cancel_of_missing_subscription_succeeds() {
    let fake = FakeProvider::scripted(vec![(
        StatusCode::NOT_FOUND,
        json!({ "error": {
            "type": "invalid_request_error",
            "code": "resource_missing",
            "message": "No such subscription"
        }}),
    )]);
    let gateway = gateway(serve(fake.clone()).await);

    gateway
        .cancel_subscription("sub_gone", "cancel-1")
        .await
        .unwrap();

    assert_eq!(fake.keys(), vec![Some("cancel-1".to_string())]);
}
