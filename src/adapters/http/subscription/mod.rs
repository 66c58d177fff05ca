//! HTTP adapter for subscription endpoints.
//!
//! - `GET /subscriptions` - List the caller's subscriptions
//! - `POST /subscriptions` - Start a subscription
//! - `GET /subscriptions/:id` - Get one subscription
//! - `POST /subscriptions/:id/cancel` - Cancel immediately
//! - `POST /webhooks/:provider` - Receive provider webhooks
//! - `GET /webhook-events` - Page through the webhook event log
//! - `GET /webhook-events/:id` - Get one logged event
//! - `POST /webhook-events/:id/retry` - Reprocess a logged event

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::*;
pub use handlers::{
    AuthenticatedUser, SubscriptionApiError, SubscriptionAppState, WebhookApiError,
    IDEMPOTENCY_KEY_HEADER, SIGNATURE_HEADER, USER_ID_HEADER,
};
pub use routes::subscription_router;
