//! Redis Streams event publisher.
//!
//! Each topic maps to the stream `{prefix}:{topic}`. Entries carry the
//! partitioning key and the JSON envelope:
//!
//! ```text
//! XADD billing:subscription_updated * key <subscription id> envelope <json>
//! ```

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

#[derive(Clone)]
pub struct RedisStreamPublisher {
    conn: MultiplexedConnection,
    prefix: String,
}

impl RedisStreamPublisher {
    pub fn new(conn: MultiplexedConnection, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    fn stream_name(&self, topic: &str) -> String {
        stream_name(&self.prefix, topic)
    }
}

fn stream_name(prefix: &str, topic: &str) -> String {
    format!("{}:{}", prefix, topic)
}

impl std::fmt::Debug for RedisStreamPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamPublisher")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventPublisher for RedisStreamPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        event: EventEnvelope,
    ) -> Result<(), DomainError> {
        let body = serde_json::to_string(&event).map_err(|e| {
            DomainError::new(
                ErrorCode::PublishError,
                format!("Failed to serialize event: {}", e),
            )
        })?;

        let mut conn = self.conn.clone();
        let _entry_id: String = redis::cmd("XADD")
            .arg(self.stream_name(topic))
            .arg("*")
            .arg("key")
            .arg(key)
            .arg("envelope")
            .arg(body)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::PublishError,
                    format!("Failed to publish to {}: {}", topic, e),
                )
            })?;

        tracing::debug!(topic, key, event_id = %event.event_id, "Published event");
        Ok(())
    }
}
