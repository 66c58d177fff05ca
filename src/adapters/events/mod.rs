//! Event bus adapters.
//!
//! - `InMemoryEventBus` - capturing publisher for tests and local runs
//! - `PublishWorker` - bounded background delivery in front of any publisher

mod in_memory;
mod publish_worker;

pub use in_memory::{InMemoryEventBus, PublishedEvent};
pub use publish_worker::{PublishStats, PublishWorker, PublishWorkerConfig};
