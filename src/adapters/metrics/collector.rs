//! Counters for event publishing and webhook handling.

use std::sync::Arc;

use prometheus::{IntCounterVec, Opts, Registry};

const NAMESPACE: &str = "billing_reconciler";

/// How a queued event left the publish worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Published,
    Failed,
    TimedOut,
    /// Rejected at enqueue because the queue was full or closed.
    Dropped,
}

impl PublishOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishOutcome::Published => "published",
            PublishOutcome::Failed => "failed",
            PublishOutcome::TimedOut => "timed_out",
            PublishOutcome::Dropped => "dropped",
        }
    }
}

/// Metrics collector shared by the publish worker and the HTTP layer.
///
/// Cloning is cheap; clones record into the same registry.
#[derive(Clone)]
pub struct MetricsCollector {
    /// Domain events by delivery outcome
    pub events_total: IntCounterVec,

    /// Provider webhooks by outcome or rejection code
    pub webhooks_total: IntCounterVec,

    registry: Arc<Registry>,
}

impl MetricsCollector {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let events_total = IntCounterVec::new(
            Opts::new("events_total", "Domain events by publish outcome").namespace(NAMESPACE),
            &["outcome"],
        )?;

        let webhooks_total = IntCounterVec::new(
            Opts::new("webhooks_total", "Provider webhooks by outcome").namespace(NAMESPACE),
            &["provider", "outcome"],
        )?;

        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(webhooks_total.clone()))?;

        Ok(Self {
            events_total,
            webhooks_total,
            registry: Arc::new(registry),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_publish(&self, outcome: PublishOutcome) {
        self.events_total.with_label_values(&[outcome.as_str()]).inc();
    }

    pub fn publish_count(&self, outcome: PublishOutcome) -> u64 {
        self.events_total.with_label_values(&[outcome.as_str()]).get()
    }

    /// `outcome` is a webhook outcome tag or a lowercased error code.
    pub fn record_webhook(&self, provider: &str, outcome: &str) {
        self.webhooks_total
            .with_label_values(&[provider, outcome])
            .inc();
    }
}
