//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, event plumbing, and error types
//! that form the vocabulary of the billing domain.

mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{domain_event, DomainEvent, EventEnvelope, EventId, EventMetadata, SerializableDomainEvent};
pub use ids::{SubscriptionId, UserId, WebhookEventId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
