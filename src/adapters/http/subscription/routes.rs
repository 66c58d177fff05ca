//! Axum router configuration for subscription endpoints.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::domain::subscription::MAX_BODY_BYTES;

use super::handlers::{
    cancel_subscription, create_subscription, get_subscription, get_webhook_event,
    handle_webhook, list_subscriptions, list_webhook_events, retry_webhook_event,
    SubscriptionAppState,
};

/// Create the subscription API router.
///
/// # Routes (require `X-User-Id`)
/// - `GET /` - List the caller's subscriptions
/// - `POST /` - Start a subscription
/// - `GET /:id` - Get one subscription
/// - `POST /:id/cancel` - Cancel immediately
pub fn subscription_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/", get(list_subscriptions).post(create_subscription))
        .route("/:id", get(get_subscription))
        .route("/:id/cancel", post(cancel_subscription))
}

/// Provider webhooks. No user auth; requests are signature verified.
///
/// Bodies are read only up to `MAX_BODY_BYTES`.
pub fn webhook_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/:provider", post(handle_webhook))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
}

/// Operator view of the webhook event log.
///
/// # Routes (require `X-Operator-Token`)
/// - `GET /` - Page through events (`limit`, `offset`)
/// - `GET /:id` - Get one event
/// - `POST /:id/retry` - Reprocess from the stored payload
pub fn webhook_event_routes() -> Router<SubscriptionAppState> {
    Router::new()
        .route("/", get(list_webhook_events))
        .route("/:id", get(get_webhook_event))
        .route("/:id/retry", post(retry_webhook_event))
}

/// Create the complete subscription module router.
pub fn subscription_router() -> Router<SubscriptionAppState> {
    Router::new()
        .nest("/subscriptions", subscription_routes())
        .nest("/webhooks", webhook_routes())
        .nest("/webhook-events", webhook_event_routes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use secrecy::SecretString;

    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::metrics::MetricsCollector;
    use crate::adapters::memory::{InMemorySubscriptionStore, InMemoryWebhookEventRepository};
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::domain::subscription::SignatureVerifier;

    fn test_state() -> SubscriptionAppState {
        SubscriptionAppState {
            store: Arc::new(InMemorySubscriptionStore::new()),
            gateway: Arc::new(MockPaymentGateway::new()),
            event_publisher: Arc::new(InMemoryEventBus::new()),
            webhook_log: Arc::new(InMemoryWebhookEventRepository::new()),
            verifier: Arc::new(SignatureVerifier::new(SecretString::new(
                "whsec_test".to_string(),
            ))),
            provider: "stripe".to_string(),
            metrics: MetricsCollector::new().unwrap(),
            operator_token: None,
        }
    }

    #[test]
    fn subscription_routes_creates_router() {
        let _: Router<()> = subscription_routes().with_state(test_state());
    }

    #[test]
    fn webhook_routes_creates_router() {
        let _: Router<()> = webhook_routes().with_state(test_state());
    }

    #[test]
    fn subscription_router_creates_combined_router() {
        let _: Router<()> = subscription_router().with_state(test_state());
    }
}
