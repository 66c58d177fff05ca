//! Event publishing configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct EventsConfig {
    /// Stream names are `{stream_prefix}:{topic}`
    #[serde(default = "default_stream_prefix")]
    pub stream_prefix: String,

    /// Upper bound on one publish call in seconds
    #[serde(default = "default_publish_timeout")]
    pub publish_timeout_secs: u64,

    /// Events buffered ahead of the publisher before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl EventsConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs(self.publish_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.stream_prefix.trim().is_empty() {
            return Err(ValidationError::MissingRequired("EVENTS_STREAM_PREFIX"));
        }
        if self.publish_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.queue_capacity == 0 {
            return Err(ValidationError::InvalidQueueCapacity);
        }
        Ok(())
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            stream_prefix: default_stream_prefix(),
            publish_timeout_secs: default_publish_timeout(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

fn default_stream_prefix() -> String {
    "billing".to_string()
}

fn default_publish_timeout() -> u64 {
    10
}

fn default_queue_capacity() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_defaults() {
        let config = EventsConfig::default();
        assert_eq!(config.stream_prefix, "billing");
        assert_eq!(config.publish_timeout(), Duration::from_secs(10));
        assert_eq!(config.queue_capacity, 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_is_invalid() {
        let config = EventsConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidQueueCapacity));
    }
}
