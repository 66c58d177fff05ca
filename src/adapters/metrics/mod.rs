//! Prometheus metrics.
//!
//! - `MetricsCollector` - registry plus the service's counters
//! - `metrics_handler` - `GET /metrics` in the text exposition format

mod collector;
mod handler;

pub use collector::{MetricsCollector, PublishOutcome};
pub use handler::metrics_handler;
