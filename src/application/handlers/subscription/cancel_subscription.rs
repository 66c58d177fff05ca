//! CancelSubscriptionHandler - immediate cancellation requested by the owner.

use std::sync::Arc;

use crate::domain::foundation::{SubscriptionId, Timestamp, UserId};
use crate::domain::subscription::{ReconciliationCommand, Subscription, SubscriptionError};
use crate::ports::{PaymentGateway, SubscriptionStore};

use super::reconcile_subscription::{
    ReconcileSubscriptionCommand, ReconcileSubscriptionHandler, ReconcileSubscriptionResult,
};

#[derive(Debug, Clone)]
pub struct CancelSubscriptionCommand {
    pub user_id: UserId,
    pub subscription_id: SubscriptionId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelSubscriptionResult {
    pub subscription: Subscription,
}

pub struct CancelSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
    gateway: Arc<dyn PaymentGateway>,
    reconciler: Arc<ReconcileSubscriptionHandler>,
}

impl CancelSubscriptionHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        gateway: Arc<dyn PaymentGateway>,
        reconciler: Arc<ReconcileSubscriptionHandler>,
    ) -> Self {
        Self {
            store,
            gateway,
            reconciler,
        }
    }

    pub async fn handle(
        &self,
        cmd: CancelSubscriptionCommand,
    ) -> Result<CancelSubscriptionResult, SubscriptionError> {
        let subscription = self
            .store
            .find_by_id_uncached(&cmd.subscription_id)
            .await?
            .filter(|s| s.is_owned_by(&cmd.user_id))
            .ok_or_else(|| SubscriptionError::not_found(cmd.subscription_id))?;

        if subscription.status.is_canceled() {
            return Ok(CancelSubscriptionResult { subscription });
        }

        let idempotency_key = format!("cancel-{}", subscription.id);
        self.gateway
            .cancel_subscription(&subscription.external_id, &idempotency_key)
            .await?;

        let instruction = ReconciliationCommand::cancel(&subscription.external_id, Timestamp::now());
        let result = self
            .reconciler
            .handle(ReconcileSubscriptionCommand { instruction })
            .await?;

        let subscription = match result {
            ReconcileSubscriptionResult::Applied { subscription, .. }
            | ReconcileSubscriptionResult::Unchanged { subscription } => subscription,
            ReconcileSubscriptionResult::NotFound { .. } => {
                return Err(SubscriptionError::not_found(cmd.subscription_id));
            }
        };

        Ok(CancelSubscriptionResult { subscription })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::events::InMemoryEventBus;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::adapters::stripe::MockPaymentGateway;
    use crate::domain::subscription::SubscriptionStatus;
    use crate::ports::{PaymentError, PaymentErrorCode};

    struct Fixture {
        store: Arc<InMemorySubscriptionStore>,
        gateway: Arc<MockPaymentGateway>,
        bus: Arc<InMemoryEventBus>,
        handler: CancelSubscriptionHandler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let gateway = Arc::new(MockPaymentGateway::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let reconciler = Arc::new(ReconcileSubscriptionHandler::new(store.clone(), bus.clone()));
        let handler = CancelSubscriptionHandler::new(store.clone(), gateway.clone(), reconciler);
        Fixture {
            store,
            gateway,
            bus,
            handler,
        }
    }

    fn seed(store: &InMemorySubscriptionStore, status: SubscriptionStatus) -> Subscription {
        let mut sub = Subscription::new_pending(
            UserId::new("user-1").unwrap(),
            "sub_1",
            "price_1",
            None,
            Timestamp::now(),
        );
        sub.status = status;
        if status.is_canceled() {
            sub.canceled_at = Some(Timestamp::now());
        }
        store.seed(sub.clone());
        sub
    }

    fn command(sub: &Subscription, user: &str) -> CancelSubscriptionCommand {
        CancelSubscriptionCommand {
            user_id: UserId::new(user).unwrap(),
            subscription_id: sub.id,
        }
    }

    #[tokio::test]
    async fn cancels_at_provider_then_locally() {
        let f = fixture();
        let sub = seed(&f.store, SubscriptionStatus::Active);

        let result = f.handler.handle(command(&sub, "user-1")).await.unwrap();

        assert_eq!(result.subscription.status, SubscriptionStatus::Canceled);
        assert!(result.subscription.canceled_at.is_some());
        let calls = f.gateway.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].target, "sub_1");
        assert_eq!(
            calls[0].idempotency_key.as_deref(),
            Some(format!("cancel-{}", sub.id).as_str())
        );
        assert_eq!(f.bus.topics(), vec!["subscription_cancelled"]);
    }

    #[tokio::test]
    async fn already_canceled_skips_provider() {
        let f = fixture();
        let sub = seed(&f.store, SubscriptionStatus::Canceled);

        let result = f.handler.handle(command(&sub, "user-1")).await.unwrap();

        assert_eq!(result.subscription.status, SubscriptionStatus::Canceled);
        assert!(f.gateway.calls().is_empty());
        assert_eq!(f.bus.event_count(), 0);
    }

    #[tokio::test]
    async fn other_users_subscription_is_not_found() {
        let f = fixture();
        let sub = seed(&f.store, SubscriptionStatus::Active);

        let err = f.handler.handle(command(&sub, "user-2")).await.unwrap_err();

        assert!(matches!(err, SubscriptionError::NotFound(_)));
        assert!(f.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn provider_failure_leaves_subscription_untouched() {
        let f = fixture();
        let sub = seed(&f.store, SubscriptionStatus::Active);
        f.gateway.push_error(
            "cancel_subscription",
            PaymentError::new(PaymentErrorCode::ProviderUnavailable, "503"),
        );

        let err = f.handler.handle(command(&sub, "user-1")).await.unwrap_err();

        assert!(matches!(err, SubscriptionError::GatewayUnavailable(_)));
        assert_eq!(f.store.get(&sub.id).unwrap().status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn local_conflict_is_retried_once() {
        let f = fixture();
        let sub = seed(&f.store, SubscriptionStatus::Active);
        f.store.inject_conflicts(1);

        let result = f.handler.handle(command(&sub, "user-1")).await.unwrap();

        assert_eq!(result.subscription.status, SubscriptionStatus::Canceled);
    }
}
