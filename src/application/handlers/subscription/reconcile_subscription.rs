//! ReconcileSubscriptionHandler - merges a provider instruction into a stored subscription.
//!
//! This is the only write path for provider-driven state. It is shared by
//! webhook processing, manual webhook retries and local cancellation.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{
    ReconciliationCommand, Subscription, SubscriptionError, SubscriptionEvent, SubscriptionStatus,
};
use crate::ports::{EventPublisher, SubscriptionStore, UpdateOutcome};

use super::publish_event;

/// Optimistic updates are tried this many times before giving up.
const MAX_UPDATE_ATTEMPTS: u32 = 2;

#[derive(Debug, Clone)]
pub struct ReconcileSubscriptionCommand {
    pub instruction: ReconciliationCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileSubscriptionResult {
    /// A change was persisted and an event enqueued.
    Applied {
        subscription: Subscription,
        previous_status: SubscriptionStatus,
    },
    /// The instruction matched the stored state; nothing was written.
    Unchanged { subscription: Subscription },
    /// No local subscription for this provider id.
    NotFound { resource_id: String },
}

pub struct ReconcileSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl ReconcileSubscriptionHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>, event_publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            store,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: ReconcileSubscriptionCommand,
    ) -> Result<ReconcileSubscriptionResult, SubscriptionError> {
        let instruction = cmd.instruction;
        let now = Timestamp::now();

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let Some(mut subscription) = self
                .store
                .find_by_external_id_uncached(&instruction.resource_id)
                .await?
            else {
                tracing::info!(
                    resource_id = %instruction.resource_id,
                    "No local subscription for provider resource, skipping"
                );
                return Ok(ReconcileSubscriptionResult::NotFound {
                    resource_id: instruction.resource_id,
                });
            };

            let expected_version = subscription.version;
            let merge = subscription.reconcile(&instruction, now);

            if let Some(rejected) = merge.rejected_status {
                tracing::warn!(
                    subscription_id = %subscription.id,
                    from = %merge.previous_status,
                    to = %rejected,
                    "Ignoring invalid status transition"
                );
            }

            if !merge.changed {
                tracing::debug!(
                    subscription_id = %subscription.id,
                    status = %subscription.status,
                    "Reconciliation produced no change"
                );
                return Ok(ReconcileSubscriptionResult::Unchanged { subscription });
            }

            match self.store.update(&subscription, expected_version).await? {
                UpdateOutcome::Updated(stored) => {
                    tracing::info!(
                        subscription_id = %stored.id,
                        from = %merge.previous_status,
                        to = %stored.status,
                        version = stored.version,
                        "Subscription reconciled"
                    );
                    let event = SubscriptionEvent::changed(&stored, merge.previous_status, now);
                    publish_event(self.event_publisher.as_ref(), &event).await;
                    return Ok(ReconcileSubscriptionResult::Applied {
                        subscription: stored,
                        previous_status: merge.previous_status,
                    });
                }
                UpdateOutcome::NotFound => {
                    return Ok(ReconcileSubscriptionResult::NotFound {
                        resource_id: instruction.resource_id,
                    });
                }
                UpdateOutcome::VersionConflict => {
                    tracing::debug!(
                        subscription_id = %subscription.id,
                        attempt,
                        "Version conflict while reconciling, re-reading"
                    );
                }
            }
        }

        Err(SubscriptionError::conflict(format!(
            "subscription {} kept changing during reconciliation",
            instruction.resource_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::domain::foundation::UserId;

    fn setup() -> (
        Arc<InMemorySubscriptionStore>,
        Arc<InMemoryEventBus>,
        ReconcileSubscriptionHandler,
    ) {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let handler = ReconcileSubscriptionHandler::new(store.clone(), bus.clone());
        (store, bus, handler)
    }

    fn seeded(store: &InMemorySubscriptionStore, status: SubscriptionStatus) -> Subscription {
        let mut sub = Subscription::new_pending(
            UserId::new("user-1").unwrap(),
            "sub_1",
            "price_1",
            Some("cus_1".to_string()),
            Timestamp::from_unix_secs(1_000).unwrap(),
        );
        sub.status = status;
        if status == SubscriptionStatus::Canceled {
            sub.canceled_at = Some(Timestamp::from_unix_secs(1_500).unwrap());
        }
        store.seed(sub.clone());
        sub
    }

    fn cmd(status: SubscriptionStatus) -> ReconcileSubscriptionCommand {
        ReconcileSubscriptionCommand {
            instruction: ReconciliationCommand::new("sub_1", status),
        }
    }

    #[tokio::test]
    async fn applies_change_and_publishes_update() {
        let (store, bus, handler) = setup();
        let sub = seeded(&store, SubscriptionStatus::Pending);

        let result = handler.handle(cmd(SubscriptionStatus::Active)).await.unwrap();

        assert!(matches!(result, ReconcileSubscriptionResult::Applied { .. }));
        assert_eq!(store.get(&sub.id).unwrap().status, SubscriptionStatus::Active);
        assert_eq!(bus.topics(), vec!["subscription_updated"]);
        assert_eq!(bus.published_events()[0].key, sub.id.to_string());
    }

    #[tokio::test]
    async fn replay_is_a_no_op() {
        let (store, bus, handler) = setup();
        let sub = seeded(&store, SubscriptionStatus::Pending);

        handler.handle(cmd(SubscriptionStatus::Active)).await.unwrap();
        let after_first = store.get(&sub.id).unwrap();
        let result = handler.handle(cmd(SubscriptionStatus::Active)).await.unwrap();

        assert!(matches!(result, ReconcileSubscriptionResult::Unchanged { .. }));
        assert_eq!(store.get(&sub.id).unwrap(), after_first);
        assert_eq!(bus.event_count(), 1);
        assert_eq!(store.update_calls(), 1);
    }

    #[tokio::test]
    async fn unknown_subscription_is_benign() {
        let (_, bus, handler) = setup();

        let result = handler.handle(cmd(SubscriptionStatus::Active)).await.unwrap();

        assert_eq!(
            result,
            ReconcileSubscriptionResult::NotFound {
                resource_id: "sub_1".to_string()
            }
        );
        assert_eq!(bus.event_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_uses_cancel_topic() {
        let (store, bus, handler) = setup();
        seeded(&store, SubscriptionStatus::Active);

        let instruction =
            ReconciliationCommand::cancel("sub_1", Timestamp::from_unix_secs(2_000).unwrap());
        handler
            .handle(ReconcileSubscriptionCommand { instruction })
            .await
            .unwrap();

        assert_eq!(bus.topics(), vec!["subscription_cancelled"]);
    }

    #[tokio::test]
    async fn canceled_subscription_ignores_later_events() {
        let (store, bus, handler) = setup();
        let sub = seeded(&store, SubscriptionStatus::Canceled);

        let result = handler.handle(cmd(SubscriptionStatus::Active)).await.unwrap();

        assert!(matches!(result, ReconcileSubscriptionResult::Unchanged { .. }));
        assert_eq!(store.get(&sub.id).unwrap().status, SubscriptionStatus::Canceled);
        assert_eq!(bus.event_count(), 0);
    }

    #[tokio::test]
    async fn single_version_conflict_is_retried() {
        let (store, bus, handler) = setup();
        let sub = seeded(&store, SubscriptionStatus::Pending);
        store.inject_conflicts(1);

        let result = handler.handle(cmd(SubscriptionStatus::Active)).await.unwrap();

        assert!(matches!(result, ReconcileSubscriptionResult::Applied { .. }));
        assert_eq!(store.get(&sub.id).unwrap().status, SubscriptionStatus::Active);
        assert_eq!(store.update_calls(), 2);
        assert_eq!(bus.event_count(), 1);
    }

    #[tokio::test]
    async fn second_version_conflict_is_transient_error() {
        let (store, bus, handler) = setup();
        seeded(&store, SubscriptionStatus::Pending);
        store.inject_conflicts(2);

        let err = handler.handle(cmd(SubscriptionStatus::Active)).await.unwrap_err();

        assert!(matches!(err, SubscriptionError::Conflict(_)));
        assert!(err.is_retryable());
        assert_eq!(bus.event_count(), 0);
    }

    #[tokio::test]
    async fn invalid_transition_keeps_status() {
        let (store, bus, handler) = setup();
        let sub = seeded(&store, SubscriptionStatus::Paused);

        let result = handler.handle(cmd(SubscriptionStatus::PastDue)).await.unwrap();

        assert!(matches!(result, ReconcileSubscriptionResult::Unchanged { .. }));
        assert_eq!(store.get(&sub.id).unwrap().status, SubscriptionStatus::Paused);
        assert_eq!(bus.event_count(), 0);
    }

    #[tokio::test]
    async fn store_outage_is_infrastructure_error() {
        let (store, _, handler) = setup();
        seeded(&store, SubscriptionStatus::Pending);
        store.set_unavailable(true);

        let err = handler.handle(cmd(SubscriptionStatus::Active)).await.unwrap_err();

        assert!(matches!(err, SubscriptionError::Infrastructure(_)));
    }

    #[tokio::test]
    async fn publish_failure_does_not_fail_reconciliation() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let bus = Arc::new(InMemoryEventBus::failing());
        let handler = ReconcileSubscriptionHandler::new(store.clone(), bus);
        let sub = seeded(&store, SubscriptionStatus::Pending);

        handler.handle(cmd(SubscriptionStatus::Active)).await.unwrap();

        assert_eq!(store.get(&sub.id).unwrap().status, SubscriptionStatus::Active);
    }
}
