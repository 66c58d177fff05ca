//! Subscription handlers.
//!
//! ## Commands
//! - Creating and cancelling subscriptions through the payment provider
//! - Handling signed provider webhooks
//! - Reconciling provider state into the store
//! - Retrying logged webhook events
//!
//! ## Queries
//! - Get / list a user's subscriptions
//! - Get / list logged webhook events

mod cancel_subscription;
mod create_subscription;
mod get_subscriptions;
mod handle_provider_webhook;
mod process_webhook_event;
mod reconcile_subscription;
mod webhook_events;

use crate::domain::subscription::SubscriptionEvent;
use crate::ports::EventPublisher;

// Commands
pub use cancel_subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
};
pub use create_subscription::{
    CreateSubscriptionCommand, CreateSubscriptionHandler, CreateSubscriptionResult,
};
pub use handle_provider_webhook::{
    HandleProviderWebhookCommand, HandleProviderWebhookHandler, HandleProviderWebhookResult,
};
pub use process_webhook_event::{WebhookOutcome, WebhookProcessor};
pub use reconcile_subscription::{
    ReconcileSubscriptionCommand, ReconcileSubscriptionHandler, ReconcileSubscriptionResult,
};
pub use webhook_events::{
    RetryWebhookEventCommand, RetryWebhookEventHandler, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
};

// Queries
pub use get_subscriptions::{
    GetSubscriptionHandler, GetSubscriptionQuery, ListSubscriptionsHandler,
    ListSubscriptionsQuery,
};
pub use webhook_events::{GetWebhookEventHandler, ListWebhookEventsHandler, ListWebhookEventsQuery};

/// Hands an event to the publisher without failing the caller.
///
/// The state change is already committed when this runs; a lost event is
/// logged and left for downstream reconciliation.
pub(crate) async fn publish_event(publisher: &dyn EventPublisher, event: &SubscriptionEvent) {
    let envelope = match event.to_envelope() {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!(
                topic = event.topic(),
                key = %event.key(),
                error = %e,
                "Failed to serialize subscription event"
            );
            return;
        }
    };

    if let Err(e) = publisher.publish(event.topic(), &event.key(), envelope).await {
        tracing::warn!(
            topic = event.topic(),
            key = %event.key(),
            error = %e,
            "Failed to publish subscription event"
        );
    }
}
