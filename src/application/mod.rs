//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Following CQRS, it separates command handlers (write) from query handlers (read).

pub mod handlers;

pub use handlers::subscription::{
    // Commands
    CancelSubscriptionCommand, CancelSubscriptionHandler, CancelSubscriptionResult,
    CreateSubscriptionCommand, CreateSubscriptionHandler, CreateSubscriptionResult,
    HandleProviderWebhookCommand, HandleProviderWebhookHandler, HandleProviderWebhookResult,
    ReconcileSubscriptionCommand, ReconcileSubscriptionHandler, ReconcileSubscriptionResult,
    RetryWebhookEventCommand, RetryWebhookEventHandler, WebhookOutcome, WebhookProcessor,
    // Queries
    GetSubscriptionHandler, GetSubscriptionQuery, GetWebhookEventHandler,
    ListSubscriptionsHandler, ListSubscriptionsQuery, ListWebhookEventsHandler,
    ListWebhookEventsQuery,
};
