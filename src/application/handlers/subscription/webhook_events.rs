//! Webhook event log queries and manual retry.

use std::sync::Arc;

use crate::domain::foundation::{Timestamp, WebhookEventId};
use crate::domain::subscription::{ProviderEvent, SubscriptionError, WebhookEvent};
use crate::ports::WebhookEventRepository;

use super::process_webhook_event::WebhookProcessor;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Default)]
pub struct ListWebhookEventsQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListWebhookEventsQuery {
    /// Limit clamped to `1..=MAX_PAGE_SIZE`.
    pub fn effective_limit(&self) -> u32 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

pub struct ListWebhookEventsHandler {
    log: Arc<dyn WebhookEventRepository>,
}

impl ListWebhookEventsHandler {
    pub fn new(log: Arc<dyn WebhookEventRepository>) -> Self {
        Self { log }
    }

    pub async fn handle(
        &self,
        query: ListWebhookEventsQuery,
    ) -> Result<Vec<WebhookEvent>, SubscriptionError> {
        let events = self
            .log
            .list(query.effective_limit(), query.offset.unwrap_or(0))
            .await?;
        Ok(events)
    }
}

pub struct GetWebhookEventHandler {
    log: Arc<dyn WebhookEventRepository>,
}

impl GetWebhookEventHandler {
    pub fn new(log: Arc<dyn WebhookEventRepository>) -> Self {
        Self { log }
    }

    pub async fn handle(&self, id: WebhookEventId) -> Result<WebhookEvent, SubscriptionError> {
        self.log
            .find_by_id(&id)
            .await?
            .ok_or_else(|| SubscriptionError::webhook_event_not_found(id))
    }
}

#[derive(Debug, Clone)]
pub struct RetryWebhookEventCommand {
    pub id: WebhookEventId,
}

/// Re-runs a logged event from its stored payload.
///
/// The event is claimed by a conditional reset to pending; of two concurrent
/// retries only the one whose claim lands reprocesses it.
pub struct RetryWebhookEventHandler {
    log: Arc<dyn WebhookEventRepository>,
    processor: Arc<WebhookProcessor>,
}

impl RetryWebhookEventHandler {
    pub fn new(log: Arc<dyn WebhookEventRepository>, processor: Arc<WebhookProcessor>) -> Self {
        Self { log, processor }
    }

    pub async fn handle(
        &self,
        cmd: RetryWebhookEventCommand,
    ) -> Result<WebhookEvent, SubscriptionError> {
        let mut record = self
            .log
            .find_by_id(&cmd.id)
            .await?
            .ok_or_else(|| SubscriptionError::webhook_event_not_found(cmd.id))?;

        record.reset_for_retry(Timestamp::now())?;
        if !self.log.claim_for_retry(&record).await? {
            return Err(SubscriptionError::conflict(format!(
                "webhook event {} is already being retried",
                record.id
            )));
        }

        let event = match ProviderEvent::parse(&record.payload) {
            Ok(event) => event,
            Err(e) => {
                record.mark_failed(e.to_string(), Timestamp::now());
                self.log.update(&record).await?;
                return Ok(record);
            }
        };

        match self.processor.process(&mut record, &event).await {
            Ok(outcome) => {
                tracing::info!(
                    webhook_event_id = %record.id,
                    outcome = outcome.as_str(),
                    "Webhook event retried"
                );
            }
            Err(e) => {
                tracing::warn!(
                    webhook_event_id = %record.id,
                    error = %e,
                    "Webhook event retry failed"
                );
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::memory::{InMemorySubscriptionStore, InMemoryWebhookEventRepository};
    use crate::application::handlers::subscription::ReconcileSubscriptionHandler;
    use crate::domain::foundation::UserId;
    use crate::domain::subscription::{Subscription, SubscriptionStatus, WebhookEventStatus};
    use serde_json::json;

    struct Fixture {
        store: Arc<InMemorySubscriptionStore>,
        log: Arc<InMemoryWebhookEventRepository>,
        retry: RetryWebhookEventHandler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let log = Arc::new(InMemoryWebhookEventRepository::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let reconciler = Arc::new(ReconcileSubscriptionHandler::new(store.clone(), bus));
        let processor = Arc::new(WebhookProcessor::new(reconciler, log.clone()));
        let retry = RetryWebhookEventHandler::new(log.clone(), processor);
        Fixture { store, log, retry }
    }

    fn failed_event(external_id: &str, payload: Vec<u8>) -> WebhookEvent {
        let mut event = WebhookEvent::received(
            external_id,
            "stripe",
            "subscription_updated",
            payload,
            Some("sub_1".to_string()),
            Timestamp::now(),
        );
        event.mark_failed("database unavailable", Timestamp::now());
        event
    }

    fn activation_payload() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": { "object": {
                "id": "sub_1",
                "object": "subscription",
                "status": "active"
            }}
        }))
        .unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // List / Get
    // ════════════════════════════════════════════════════════════════════════════

    #[test]
    fn limit_is_clamped() {
        let q = |limit| ListWebhookEventsQuery { limit, offset: None };
        assert_eq!(q(None).effective_limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(q(Some(0)).effective_limit(), 1);
        assert_eq!(q(Some(500)).effective_limit(), MAX_PAGE_SIZE);
        assert_eq!(q(Some(42)).effective_limit(), 42);
    }

    #[tokio::test]
    async fn list_is_newest_first_with_offset() {
        let log = Arc::new(InMemoryWebhookEventRepository::new());
        for id in ["evt_1", "evt_2", "evt_3"] {
            log.create(&failed_event(id, vec![])).await.unwrap();
        }
        let handler = ListWebhookEventsHandler::new(log);

        let page = handler
            .handle(ListWebhookEventsQuery {
                limit: Some(2),
                offset: Some(1),
            })
            .await
            .unwrap();

        let ids: Vec<_> = page.iter().map(|e| e.external_id.as_str()).collect();
        assert_eq!(ids, vec!["evt_2", "evt_1"]);
    }

    #[tokio::test]
    async fn get_missing_event_is_not_found() {
        let handler = GetWebhookEventHandler::new(Arc::new(InMemoryWebhookEventRepository::new()));

        let err = handler.handle(WebhookEventId::new()).await.unwrap_err();

        assert!(matches!(err, SubscriptionError::WebhookEventNotFound(_)));
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Retry
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn retry_reprocesses_failed_event() {
        let f = fixture();
        let sub = Subscription::new_pending(
            UserId::new("user-1").unwrap(),
            "sub_1",
            "price_1",
            None,
            Timestamp::now(),
        );
        f.store.seed(sub.clone());
        let event = failed_event("evt_1", activation_payload());
        f.log.create(&event).await.unwrap();

        let retried = f
            .retry
            .handle(RetryWebhookEventCommand { id: event.id })
            .await
            .unwrap();

        assert_eq!(retried.status, WebhookEventStatus::Processed);
        assert_eq!(retried.attempt_count, 2);
        assert_eq!(f.store.get(&sub.id).unwrap().status, SubscriptionStatus::Active);
        assert_eq!(f.log.all()[0].status, WebhookEventStatus::Processed);
    }

    #[tokio::test]
    async fn retry_with_corrupt_payload_marks_failed() {
        let f = fixture();
        let event = failed_event("evt_1", b"not json".to_vec());
        f.log.create(&event).await.unwrap();

        let retried = f
            .retry
            .handle(RetryWebhookEventCommand { id: event.id })
            .await
            .unwrap();

        assert_eq!(retried.status, WebhookEventStatus::Failed);
        assert!(retried.error_message.is_some());
    }

    #[tokio::test]
    async fn retry_of_pending_event_is_conflict() {
        let f = fixture();
        let event = WebhookEvent::received(
            "evt_1",
            "stripe",
            "subscription_updated",
            activation_payload(),
            None,
            Timestamp::now(),
        );
        f.log.create(&event).await.unwrap();

        let err = f
            .retry
            .handle(RetryWebhookEventCommand { id: event.id })
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::Conflict(_)));
    }

    #[tokio::test]
    async fn retry_of_unknown_event_is_not_found() {
        let f = fixture();

        let err = f
            .retry
            .handle(RetryWebhookEventCommand {
                id: WebhookEventId::new(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::WebhookEventNotFound(_)));
    }
}
