//! In-memory event bus for tests and local runs.
//!
//! Captures everything published for assertions. Can be told to fail or to
//! stall so the publish worker's failure and timeout paths can be exercised.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

/// One captured publish call.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedEvent {
    pub topic: String,
    pub key: String,
    pub envelope: EventEnvelope,
}

#[derive(Default)]
struct Behavior {
    fail: bool,
    delay: Option<Duration>,
}

/// In-memory event bus.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// bus.publish("subscription_updated", "key", envelope).await?;
/// assert_eq!(bus.topics(), vec!["subscription_updated"]);
/// ```
#[derive(Default)]
pub struct InMemoryEventBus {
    published: Mutex<Vec<PublishedEvent>>,
    behavior: Mutex<Behavior>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every publish returns an error.
    pub fn failing() -> Self {
        let bus = Self::new();
        bus.set_failing(true);
        bus
    }

    /// Every publish waits `delay` before completing.
    pub fn stalling(delay: Duration) -> Self {
        let bus = Self::new();
        lock(&bus.behavior).delay = Some(delay);
        bus
    }

    pub fn set_failing(&self, fail: bool) {
        lock(&self.behavior).fail = fail;
    }

    // === Test Helpers ===

    pub fn published_events(&self) -> Vec<PublishedEvent> {
        lock(&self.published).clone()
    }

    pub fn topics(&self) -> Vec<String> {
        lock(&self.published).iter().map(|e| e.topic.clone()).collect()
    }

    pub fn event_count(&self) -> usize {
        lock(&self.published).len()
    }

    pub fn clear(&self) {
        lock(&self.published).clear();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        event: EventEnvelope,
    ) -> Result<(), DomainError> {
        let (fail, delay) = {
            let behavior = lock(&self.behavior);
            (behavior.fail, behavior.delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(DomainError::new(
                ErrorCode::PublishError,
                format!("Publish to {} rejected", topic),
            ));
        }

        lock(&self.published).push(PublishedEvent {
            topic: topic.to_string(),
            key: key.to_string(),
            envelope: event,
        });
        Ok(())
    }
}
