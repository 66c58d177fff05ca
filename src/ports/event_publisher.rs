//! EventPublisher port - Interface for publishing domain events.
//!
//! This port defines how the domain publishes events without knowing
//! about the underlying transport (in-memory, Redis streams).

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Port for publishing domain events to a topic.
///
/// Implementations deliver at-least-once. `key` is the partitioning key;
/// events sharing a key must keep their relative order on the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, event: EventEnvelope)
        -> Result<(), DomainError>;
}
