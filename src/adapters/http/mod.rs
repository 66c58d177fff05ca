//! HTTP adapters - REST API implementations.

pub mod subscription;

use std::time::Duration;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::adapters::metrics::metrics_handler;

pub use subscription::{subscription_router, SubscriptionAppState};

/// Full application router with request tracing and a per-request timeout.
pub fn app_router(state: SubscriptionAppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .merge(subscription_router())
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
