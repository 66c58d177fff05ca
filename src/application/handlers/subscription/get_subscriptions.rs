//! Subscription queries.

use std::sync::Arc;

use crate::domain::foundation::{SubscriptionId, UserId};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::SubscriptionStore;

#[derive(Debug, Clone)]
pub struct GetSubscriptionQuery {
    pub user_id: UserId,
    pub subscription_id: SubscriptionId,
}

/// Returns one subscription owned by the caller.
pub struct GetSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl GetSubscriptionHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, query: GetSubscriptionQuery) -> Result<Subscription, SubscriptionError> {
        // Someone else's subscription looks the same as a missing one.
        self.store
            .find_by_id(&query.subscription_id)
            .await?
            .filter(|s| s.is_owned_by(&query.user_id))
            .ok_or_else(|| SubscriptionError::not_found(query.subscription_id))
    }
}

#[derive(Debug, Clone)]
pub struct ListSubscriptionsQuery {
    pub user_id: UserId,
}

pub struct ListSubscriptionsHandler {
    store: Arc<dyn SubscriptionStore>,
}

impl ListSubscriptionsHandler {
    pub fn new(store: Arc<dyn SubscriptionStore>) -> Self {
        Self { store }
    }

    /// Newest first.
    pub async fn handle(
        &self,
        query: ListSubscriptionsQuery,
    ) -> Result<Vec<Subscription>, SubscriptionError> {
        Ok(self.store.find_by_user_id(&query.user_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::domain::foundation::Timestamp;

    fn subscription(user: &str, external_id: &str, created_secs: i64) -> Subscription {
        Subscription::new_pending(
            UserId::new(user).unwrap(),
            external_id,
            "price_1",
            None,
            Timestamp::from_unix_secs(created_secs).unwrap(),
        )
    }

    #[tokio::test]
    async fn get_returns_owned_subscription() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sub = subscription("user-1", "sub_1", 1_000);
        store.seed(sub.clone());
        let handler = GetSubscriptionHandler::new(store);

        let found = handler
            .handle(GetSubscriptionQuery {
                user_id: UserId::new("user-1").unwrap(),
                subscription_id: sub.id,
            })
            .await
            .unwrap();

        assert_eq!(found, sub);
    }

    #[tokio::test]
    async fn get_hides_other_users_subscription() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        let sub = subscription("user-1", "sub_1", 1_000);
        store.seed(sub.clone());
        let handler = GetSubscriptionHandler::new(store);

        let err = handler
            .handle(GetSubscriptionQuery {
                user_id: UserId::new("user-2").unwrap(),
                subscription_id: sub.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, SubscriptionError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_returns_only_callers_subscriptions_newest_first() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        store.seed(subscription("user-1", "sub_old", 1_000));
        store.seed(subscription("user-1", "sub_new", 2_000));
        store.seed(subscription("user-2", "sub_other", 3_000));
        let handler = ListSubscriptionsHandler::new(store);

        let list = handler
            .handle(ListSubscriptionsQuery {
                user_id: UserId::new("user-1").unwrap(),
            })
            .await
            .unwrap();

        let ids: Vec<_> = list.iter().map(|s| s.external_id.as_str()).collect();
        assert_eq!(ids, vec!["sub_new", "sub_old"]);
    }

    #[tokio::test]
    async fn store_failure_is_infrastructure_error() {
        let store = Arc::new(InMemorySubscriptionStore::new());
        store.set_unavailable(true);
        let handler = ListSubscriptionsHandler::new(store);

        let err = handler
            .handle(ListSubscriptionsQuery {
                user_id: UserId::new("user-1").unwrap(),
            })
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }
}
