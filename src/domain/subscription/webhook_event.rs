//! Webhook event log entry.
//!
//! Every received provider event is recorded before it is processed and is
//! never deleted; the log is the audit trail for reconciliation and the
//! source for manual retries.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, WebhookEventId};

use super::errors::SubscriptionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookEventStatus {
    Pending,
    Processed,
    Failed,
}

impl WebhookEventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processed" => Some(Self::Processed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// A provider event as received, plus its processing state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: WebhookEventId,
    /// Provider event id.
    pub external_id: String,
    pub provider: String,
    /// Event kind tag (see `ProviderEventKind::tag`).
    pub event_type: String,
    pub status: WebhookEventStatus,
    #[serde(skip)]
    pub payload: Vec<u8>,
    /// Best-effort subscription/customer id.
    pub resource_id: Option<String>,
    pub attempt_count: i32,
    pub last_attempt: Option<Timestamp>,
    pub processed_at: Option<Timestamp>,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl WebhookEvent {
    /// Records a freshly received event as pending.
    pub fn received(
        external_id: impl Into<String>,
        provider: impl Into<String>,
        event_type: impl Into<String>,
        payload: Vec<u8>,
        resource_id: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: WebhookEventId::new(),
            external_id: external_id.into(),
            provider: provider.into(),
            event_type: event_type.into(),
            status: WebhookEventStatus::Pending,
            payload,
            resource_id,
            attempt_count: 0,
            last_attempt: None,
            processed_at: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.status == WebhookEventStatus::Processed
    }

    pub fn mark_processed(&mut self, now: Timestamp) {
        self.attempt_count += 1;
        self.last_attempt = Some(now);
        self.status = WebhookEventStatus::Processed;
        self.processed_at = Some(now);
        self.error_message = None;
        self.updated_at = now;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>, now: Timestamp) {
        self.attempt_count += 1;
        self.last_attempt = Some(now);
        self.status = WebhookEventStatus::Failed;
        self.error_message = Some(error.into());
        self.updated_at = now;
    }

    /// Puts a finished event back to pending so it can be processed again.
    pub fn reset_for_retry(&mut self, now: Timestamp) -> Result<(), SubscriptionError> {
        if self.status == WebhookEventStatus::Pending {
            return Err(SubscriptionError::conflict(format!(
                "webhook event {} is already pending",
                self.id
            )));
        }
        self.status = WebhookEventStatus::Pending;
        self.error_message = None;
        self.updated_at = now;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> WebhookEvent {
        WebhookEvent::received(
            "evt_1",
            "stripe",
            "subscription_updated",
            b"{}".to_vec(),
            Some("sub_1".to_string()),
            Timestamp::from_unix_secs(1_000).unwrap(),
        )
    }

    #[test]
    fn received_event_starts_pending_without_attempts() {
        let e = event();
        assert_eq!(e.status, WebhookEventStatus::Pending);
        assert_eq!(e.attempt_count, 0);
        assert!(e.processed_at.is_none());
    }

    #[test]
    fn processing_outcomes_count_attempts() {
        let mut e = event();
        let t1 = Timestamp::from_unix_secs(2_000).unwrap();
        let t2 = Timestamp::from_unix_secs(3_000).unwrap();

        e.mark_failed("db down", t1);
        assert_eq!(e.status, WebhookEventStatus::Failed);
        assert_eq!(e.attempt_count, 1);
        assert_eq!(e.error_message.as_deref(), Some("db down"));

        e.reset_for_retry(t2).unwrap();
        e.mark_processed(t2);
        assert_eq!(e.attempt_count, 2);
        assert_eq!(e.processed_at, Some(t2));
        assert_eq!(e.error_message, None);
    }

    #[test]
    fn pending_event_cannot_be_reset() {
        let mut e = event();
        assert!(matches!(
            e.reset_for_retry(Timestamp::now()),
            Err(SubscriptionError::Conflict(_))
        ));
    }

    #[test]
    fn reset_clears_error_message() {
        let mut e = event();
        e.mark_failed("boom", Timestamp::now());
        e.reset_for_retry(Timestamp::now()).unwrap();
        assert_eq!(e.status, WebhookEventStatus::Pending);
        assert_eq!(e.error_message, None);
    }

    #[test]
    fn status_storage_representation_roundtrips() {
        for status in [
            WebhookEventStatus::Pending,
            WebhookEventStatus::Processed,
            WebhookEventStatus::Failed,
        ] {
            assert_eq!(WebhookEventStatus::parse(status.as_str()), Some(status));
        }
    }
}
