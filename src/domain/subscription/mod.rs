//! Subscription domain module.
//!
//! Handles the provider-driven subscription lifecycle.
//!
//! # Module Structure
//!
//! - `aggregate` - Subscription aggregate and its merge rules
//! - `status` - SubscriptionStatus state machine
//! - `reconciliation` - normalized commands produced from provider events
//! - `provider_event` - provider webhook envelope and event kinds
//! - `router` - event classification and field extraction
//! - `signature` - webhook signature verification
//! - `webhook_event` - webhook event log entry
//! - `events` - domain events emitted after changes
//! - `errors` - webhook and subscription errors

mod aggregate;
mod errors;
mod events;
mod provider_event;
mod reconciliation;
mod router;
mod signature;
mod status;
mod webhook_event;

pub use aggregate::{MergeOutcome, Subscription};
pub use errors::{SubscriptionError, WebhookError};
pub use events::{
    SubscriptionCanceled, SubscriptionCreated, SubscriptionEvent, SubscriptionUpdated,
    TOPIC_SUBSCRIPTION_CANCELED, TOPIC_SUBSCRIPTION_CREATED, TOPIC_SUBSCRIPTION_UPDATED,
};
pub use provider_event::{ProviderEvent, ProviderEventData, ProviderEventKind};
pub use reconciliation::{ReconciliationCommand, RouteOutcome};
pub use router::{resource_id, EventRouter};
pub use signature::{sign_payload, SignatureHeader, SignatureVerifier, MAX_BODY_BYTES};
pub use status::SubscriptionStatus;
pub use webhook_event::{WebhookEvent, WebhookEventStatus};
