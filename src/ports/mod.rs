//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `SubscriptionStore` - Durable subscriptions with optimistic versioning
//! - `CacheStore` - Best-effort read cache in front of the store
//! - `WebhookEventRepository` - Log of received provider webhooks
//!
//! ## Outbound Ports
//!
//! - `PaymentGateway` - Calls to the payment provider
//! - `EventPublisher` - Domain events to the event bus

mod cache;
mod event_publisher;
mod payment_gateway;
mod subscription_store;
mod webhook_event_repository;

pub use cache::{CacheError, CacheStore};
pub use event_publisher::EventPublisher;
pub use payment_gateway::{
    CreateSubscriptionRequest, CreatedSubscription, PaymentError, PaymentErrorCode, PaymentGateway,
};
pub use subscription_store::{SubscriptionStore, UpdateOutcome};
pub use webhook_event_repository::{SaveResult, WebhookEventRepository};
