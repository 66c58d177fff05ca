//! PostgreSQL adapters - Database implementations for storage ports.
//!
//! - `PostgresSubscriptionStore` - Subscriptions with optimistic versioning
//! - `PostgresWebhookEventRepository` - Webhook event log

mod subscription_store;
mod webhook_event_repository;

pub use subscription_store::PostgresSubscriptionStore;
pub use webhook_event_repository::PostgresWebhookEventRepository;
