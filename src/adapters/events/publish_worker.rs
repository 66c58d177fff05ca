//! PublishWorker - bounded background delivery of domain events.
//!
//! Request handlers enqueue events and return immediately; a single spawned
//! task drains the queue and hands each event to the underlying publisher
//! under a timeout. Failures are counted in the shared `MetricsCollector`
//! and logged, never retried.
//!
//! ## Configuration
//!
//! | Setting | Default | Description |
//! |---------|---------|-------------|
//! | `publish_timeout` | 10s | Upper bound for one publish call |
//! | `queue_capacity` | 1024 | Events buffered before new ones are dropped |
//!
//! ## Graceful Shutdown
//!
//! `shutdown()` stops intake, publishes everything still queued, and joins
//! the task.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::adapters::metrics::{MetricsCollector, PublishOutcome};
use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

/// Configuration for the PublishWorker.
#[derive(Debug, Clone)]
pub struct PublishWorkerConfig {
    pub publish_timeout: Duration,
    pub queue_capacity: usize,
}

impl Default for PublishWorkerConfig {
    fn default() -> Self {
        Self {
            publish_timeout: Duration::from_secs(10),
            queue_capacity: 1024,
        }
    }
}

impl PublishWorkerConfig {
    pub fn with_publish_timeout(mut self, timeout: Duration) -> Self {
        self.publish_timeout = timeout;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

/// Snapshot of the worker's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub published: u64,
    pub failed: u64,
    pub timed_out: u64,
    /// Rejected at enqueue because the queue was full or closed.
    pub dropped: u64,
}

enum Job {
    Publish {
        topic: String,
        key: String,
        envelope: EventEnvelope,
    },
    /// Completed once every job queued ahead of it has been attempted.
    Flush(oneshot::Sender<()>),
}

/// Fire-and-forget event delivery on a detached task.
pub struct PublishWorker {
    sender: mpsc::Sender<Job>,
    shutdown: watch::Sender<bool>,
    metrics: MetricsCollector,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl PublishWorker {
    /// Spawns the worker task on the current runtime.
    pub fn spawn(
        publisher: Arc<dyn EventPublisher>,
        config: PublishWorkerConfig,
        metrics: MetricsCollector,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run(
            publisher,
            receiver,
            shutdown_rx,
            metrics.clone(),
            config.publish_timeout,
        ));

        Self {
            sender,
            shutdown,
            metrics,
            handle: Mutex::new(Some(handle)),
        }
    }

    pub fn stats(&self) -> PublishStats {
        PublishStats {
            published: self.metrics.publish_count(PublishOutcome::Published),
            failed: self.metrics.publish_count(PublishOutcome::Failed),
            timed_out: self.metrics.publish_count(PublishOutcome::TimedOut),
            dropped: self.metrics.publish_count(PublishOutcome::Dropped),
        }
    }

    /// Waits until everything enqueued before this call has been attempted.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(Job::Flush(tx)).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Stops intake, drains the queue, and joins the worker task.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Publish worker task failed");
            }
        }
    }

    fn enqueue(&self, job: Job) -> Result<(), DomainError> {
        self.sender.try_send(job).map_err(|e| {
            self.metrics.record_publish(PublishOutcome::Dropped);
            let reason = match e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "worker stopped",
            };
            DomainError::new(
                ErrorCode::PublishError,
                format!("Event dropped: {}", reason),
            )
        })
    }
}

impl std::fmt::Debug for PublishWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishWorker")
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

/// Enqueueing counts as success; delivery happens later on the worker task.
#[async_trait]
impl EventPublisher for PublishWorker {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        event: EventEnvelope,
    ) -> Result<(), DomainError> {
        self.enqueue(Job::Publish {
            topic: topic.to_string(),
            key: key.to_string(),
            envelope: event,
        })
    }
}

async fn run(
    publisher: Arc<dyn EventPublisher>,
    mut receiver: mpsc::Receiver<Job>,
    mut shutdown: watch::Receiver<bool>,
    metrics: MetricsCollector,
    timeout: Duration,
) {
    loop {
        tokio::select! {
            biased;

            job = receiver.recv() => match job {
                Some(job) => process(&*publisher, job, &metrics, timeout).await,
                None => return,
            },

            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    receiver.close();
                    while let Some(job) = receiver.recv().await {
                        process(&*publisher, job, &metrics, timeout).await;
                    }
                    tracing::debug!("Publish worker drained and stopped");
                    return;
                }
            }
        }
    }
}

async fn process(
    publisher: &dyn EventPublisher,
    job: Job,
    metrics: &MetricsCollector,
    timeout: Duration,
) {
    let (topic, key, envelope) = match job {
        Job::Publish {
            topic,
            key,
            envelope,
        } => (topic, key, envelope),
        Job::Flush(done) => {
            let _ = done.send(());
            return;
        }
    };

    let event_id = envelope.event_id.clone();
    match tokio::time::timeout(timeout, publisher.publish(&topic, &key, envelope)).await {
        Ok(Ok(())) => {
            metrics.record_publish(PublishOutcome::Published);
        }
        Ok(Err(e)) => {
            metrics.record_publish(PublishOutcome::Failed);
            tracing::warn!(topic = %topic, event_id = %event_id, error = %e, "Failed to publish event");
        }
        Err(_) => {
            metrics.record_publish(PublishOutcome::TimedOut);
            tracing::warn!(
                topic = %topic,
                event_id = %event_id,
                timeout_ms = timeout.as_millis() as u64,
                "Publishing event timed out"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use serde_json::json;

    fn metrics() -> MetricsCollector {
        MetricsCollector::new().unwrap()
    }

    fn envelope(n: u32) -> EventEnvelope {
        EventEnvelope::new(
            "subscription.updated.v1",
            format!("sub-{}", n),
            "Subscription",
            json!({ "n": n }),
        )
    }

    #[tokio::test]
    async fn flush_waits_for_queued_events() {
        let bus = Arc::new(InMemoryEventBus::new());
        let worker = PublishWorker::spawn(bus.clone(), PublishWorkerConfig::default(), metrics());

        for n in 0..5 {
            worker.publish("subscription_updated", "k", envelope(n)).await.unwrap();
        }
        worker.flush().await;

        assert_eq!(bus.event_count(), 5);
        assert_eq!(worker.stats().published, 5);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn events_with_same_key_keep_order() {
        let bus = Arc::new(InMemoryEventBus::new());
        let worker = PublishWorker::spawn(bus.clone(), PublishWorkerConfig::default(), metrics());

        for n in 0..3 {
            worker.publish("t", "same", envelope(n)).await.unwrap();
        }
        worker.flush().await;

        let order: Vec<u64> = bus
            .published_events()
            .iter()
            .map(|e| e.envelope.payload["n"].as_u64().unwrap())
            .collect();
        assert_eq!(order, vec![0, 1, 2]);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn publish_failures_are_counted_not_retried() {
        let bus = Arc::new(InMemoryEventBus::failing());
        let worker = PublishWorker::spawn(bus.clone(), PublishWorkerConfig::default(), metrics());

        worker.publish("t", "k", envelope(1)).await.unwrap();
        worker.flush().await;

        assert_eq!(worker.stats().failed, 1);
        assert_eq!(worker.stats().published, 0);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn slow_publish_is_counted_as_timed_out() {
        let bus = Arc::new(InMemoryEventBus::stalling(Duration::from_millis(200)));
        let config = PublishWorkerConfig::default().with_publish_timeout(Duration::from_millis(10));
        let worker = PublishWorker::spawn(bus.clone(), config, metrics());

        worker.publish("t", "k", envelope(1)).await.unwrap();
        worker.flush().await;

        assert_eq!(worker.stats().timed_out, 1);
        assert_eq!(bus.event_count(), 0);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn full_queue_drops_and_reports_error() {
        let bus = Arc::new(InMemoryEventBus::stalling(Duration::from_millis(100)));
        let config = PublishWorkerConfig::default().with_queue_capacity(1);
        let worker = PublishWorker::spawn(bus.clone(), config, metrics());

        let mut rejected = 0;
        for n in 0..10 {
            if worker.publish("t", "k", envelope(n)).await.is_err() {
                rejected += 1;
            }
        }

        assert!(rejected > 0);
        assert_eq!(worker.stats().dropped, rejected);
        worker.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_drains_queue() {
        let bus = Arc::new(InMemoryEventBus::new());
        let worker = PublishWorker::spawn(bus.clone(), PublishWorkerConfig::default(), metrics());

        for n in 0..4 {
            worker.publish("t", "k", envelope(n)).await.unwrap();
        }
        worker.shutdown().await;

        assert_eq!(bus.event_count(), 4);
        assert!(worker.publish("t", "k", envelope(9)).await.is_err());
    }

    #[tokio::test]
    async fn outcomes_land_in_the_shared_registry() {
        let bus = Arc::new(InMemoryEventBus::new());
        let metrics = metrics();
        let worker = PublishWorker::spawn(bus.clone(), PublishWorkerConfig::default(), metrics.clone());

        worker.publish("t", "k", envelope(1)).await.unwrap();
        worker.flush().await;

        assert_eq!(metrics.publish_count(PublishOutcome::Published), 1);
        worker.shutdown().await;
    }
}
