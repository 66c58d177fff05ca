//! Read-through, write-through cache in front of a `SubscriptionStore`.
//!
//! Keys:
//! - `subscription:{id}`
//! - `subscription_ext:{external_id}`
//! - `user_subscriptions:{user_id}`
//!
//! The cache never decides an outcome. Every cache error is logged and
//! treated as a miss; the wrapped store stays the source of truth, and the
//! `*_uncached` lookups used by write paths always go to it.
//!
//! A single-record entry is only replaced by a higher `version`, so a slow
//! read-through cannot put an older row back over a newer one. When a
//! refresh cannot be written the keys are dropped instead.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::domain::foundation::{DomainError, SubscriptionId, UserId};
use crate::domain::subscription::Subscription;
use crate::ports::{CacheStore, SubscriptionStore, UpdateOutcome};

pub fn subscription_key(id: &SubscriptionId) -> String {
    format!("subscription:{}", id)
}

pub fn external_key(external_id: &str) -> String {
    format!("subscription_ext:{}", external_id)
}

pub fn user_key(user_id: &UserId) -> String {
    format!("user_subscriptions:{}", user_id)
}

pub struct CachedSubscriptionStore {
    inner: Arc<dyn SubscriptionStore>,
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl CachedSubscriptionStore {
    pub fn new(
        inner: Arc<dyn SubscriptionStore>,
        cache: Arc<dyn CacheStore>,
        ttl: Duration,
    ) -> Self {
        Self { inner, cache, ttl }
    }

    async fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Discarding unreadable cache entry");
                    self.delete(key).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Returns false when the entry could not be written.
    async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize cache entry");
                return false;
            }
        };
        match self.cache.set(key, raw, self.ttl).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "Cache write failed");
                false
            }
        }
    }

    /// Writes `subscription` unless the cached copy is at least as new.
    async fn write_if_newer(&self, key: &str, subscription: &Subscription) -> bool {
        if let Some(cached) = self.read::<Subscription>(key).await {
            if cached.version >= subscription.version {
                return true;
            }
        }
        self.write(key, subscription).await
    }

    async fn delete(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            tracing::warn!(key, error = %e, "Cache invalidation failed");
        }
    }

    async fn refresh(&self, subscription: &Subscription) {
        let by_id = subscription_key(&subscription.id);
        let by_ext = external_key(&subscription.external_id);
        let (id_written, ext_written) = join(
            self.write_if_newer(&by_id, subscription),
            self.write_if_newer(&by_ext, subscription),
        )
        .await;
        if !(id_written && ext_written) {
            self.evict(subscription).await;
        }
    }

    async fn evict(&self, subscription: &Subscription) {
        let by_id = subscription_key(&subscription.id);
        let by_ext = external_key(&subscription.external_id);
        join(self.delete(&by_id), self.delete(&by_ext)).await;
    }
}

#[async_trait]
impl SubscriptionStore for CachedSubscriptionStore {
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        if let Some(hit) = self.read::<Subscription>(&external_key(external_id)).await {
            return Ok(Some(hit));
        }
        let found = self.inner.find_by_external_id(external_id).await?;
        if let Some(sub) = &found {
            self.refresh(sub).await;
        }
        Ok(found)
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        if let Some(hit) = self.read::<Subscription>(&subscription_key(id)).await {
            return Ok(Some(hit));
        }
        let found = self.inner.find_by_id(id).await?;
        if let Some(sub) = &found {
            self.refresh(sub).await;
        }
        Ok(found)
    }

    async fn find_by_external_id_uncached(
        &self,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        self.inner.find_by_external_id_uncached(external_id).await
    }

    async fn find_by_id_uncached(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.inner.find_by_id_uncached(id).await
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Vec<Subscription>, DomainError> {
        let key = user_key(user_id);
        if let Some(hit) = self.read::<Vec<Subscription>>(&key).await {
            return Ok(hit);
        }
        let found = self.inner.find_by_user_id(user_id).await?;
        self.write(&key, &found).await;
        Ok(found)
    }

    async fn create(&self, subscription: &Subscription) -> Result<(), DomainError> {
        self.inner.create(subscription).await?;
        join(
            self.refresh(subscription),
            self.delete(&user_key(&subscription.user_id)),
        )
        .await;
        Ok(())
    }

    async fn update(
        &self,
        subscription: &Subscription,
        expected_version: i64,
    ) -> Result<UpdateOutcome, DomainError> {
        let outcome = self.inner.update(subscription, expected_version).await?;
        match &outcome {
            UpdateOutcome::Updated(stored) => {
                join(self.refresh(stored), self.delete(&user_key(&stored.user_id))).await;
            }
            UpdateOutcome::VersionConflict | UpdateOutcome::NotFound => {
                // Whatever the caller read may have come from a stale entry.
                self.evict(subscription).await;
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::InMemoryCache;
    use crate::adapters::memory::InMemorySubscriptionStore;
    use crate::domain::foundation::Timestamp;
    use crate::domain::subscription::SubscriptionStatus;

    fn subscription() -> Subscription {
        Subscription::new_pending(
            UserId::new("user-1").unwrap(),
            "sub_1",
            "price_1",
            None,
            Timestamp::now(),
        )
    }

    fn setup(cache: Arc<InMemoryCache>) -> (Arc<InMemorySubscriptionStore>, CachedSubscriptionStore) {
        let inner = Arc::new(InMemorySubscriptionStore::new());
        let store = CachedSubscriptionStore::new(inner.clone(), cache, Duration::from_secs(60));
        (inner, store)
    }

    #[tokio::test]
    async fn create_writes_through_both_keys() {
        let cache = Arc::new(InMemoryCache::new());
        let (_, store) = setup(cache.clone());
        let sub = subscription();

        store.create(&sub).await.unwrap();

        assert!(cache.contains(&subscription_key(&sub.id)));
        assert!(cache.contains(&external_key("sub_1")));
    }

    #[tokio::test]
    async fn update_invalidates_user_list() {
        let cache = Arc::new(InMemoryCache::new());
        let (_, store) = setup(cache.clone());
        let mut sub = subscription();
        store.create(&sub).await.unwrap();
        store.find_by_user_id(&sub.user_id).await.unwrap();
        assert!(cache.contains(&user_key(&sub.user_id)));

        sub.status = SubscriptionStatus::Active;
        let outcome = store.update(&sub, sub.version).await.unwrap();

        assert!(matches!(outcome, UpdateOutcome::Updated(_)));
        assert!(!cache.contains(&user_key(&sub.user_id)));
        let cached = store.find_by_external_id("sub_1").await.unwrap().unwrap();
        assert_eq!(cached.status, SubscriptionStatus::Active);
        assert_eq!(cached.version, sub.version + 1);
    }

    #[tokio::test]
    async fn cache_outage_does_not_fail_reads_or_writes() {
        let cache = Arc::new(InMemoryCache::unavailable());
        let (_, store) = setup(cache);
        let mut sub = subscription();

        store.create(&sub).await.unwrap();
        sub.status = SubscriptionStatus::Active;
        store.update(&sub, sub.version).await.unwrap();

        let found = store.find_by_external_id("sub_1").await.unwrap().unwrap();
        assert_eq!(found.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn conflict_evicts_stale_entries() {
        let cache = Arc::new(InMemoryCache::new());
        let (_, store) = setup(cache.clone());
        let sub = subscription();
        store.create(&sub).await.unwrap();

        let outcome = store.update(&sub, sub.version + 7).await.unwrap();

        assert_eq!(outcome, UpdateOutcome::VersionConflict);
        assert!(!cache.contains(&external_key("sub_1")));
    }

    #[tokio::test]
    async fn failed_refresh_drops_the_old_entry() {
        let cache = Arc::new(InMemoryCache::new());
        let (_, store) = setup(cache.clone());
        let mut sub = subscription();
        store.create(&sub).await.unwrap();
        cache.set_failing_writes(true);

        sub.status = SubscriptionStatus::Active;
        store.update(&sub, sub.version).await.unwrap();

        assert!(!cache.contains(&subscription_key(&sub.id)));
        assert!(!cache.contains(&external_key("sub_1")));
    }

    #[tokio::test]
    async fn older_row_never_replaces_a_newer_entry() {
        let cache = Arc::new(InMemoryCache::new());
        let (_, store) = setup(cache.clone());
        let stale = subscription();
        store.create(&stale).await.unwrap();
        let mut newer = stale.clone();
        newer.status = SubscriptionStatus::PastDue;
        let UpdateOutcome::Updated(newer) = store.update(&newer, stale.version).await.unwrap()
        else {
            panic!("update should land");
        };

        // a reader that loaded the row before the update finishes late
        store.refresh(&stale).await;

        let cached = store.find_by_external_id("sub_1").await.unwrap().unwrap();
        assert_eq!(cached.version, newer.version);
        assert_eq!(cached.status, SubscriptionStatus::PastDue);
    }

    #[tokio::test]
    async fn uncached_lookup_ignores_stale_entries() {
        let cache = Arc::new(InMemoryCache::new());
        let (inner, store) = setup(cache.clone());
        let sub = subscription();
        store.create(&sub).await.unwrap();
        let mut moved_on = sub.clone();
        moved_on.status = SubscriptionStatus::Active;
        inner.update(&moved_on, sub.version).await.unwrap();

        let cached = store.find_by_external_id("sub_1").await.unwrap().unwrap();
        let fresh = store.find_by_external_id_uncached("sub_1").await.unwrap().unwrap();

        assert_eq!(cached.status, SubscriptionStatus::Pending);
        assert_eq!(fresh.status, SubscriptionStatus::Active);
    }

    #[tokio::test]
    async fn unreadable_entry_falls_back_to_store() {
        let cache = Arc::new(InMemoryCache::new());
        let (inner, store) = setup(cache.clone());
        let sub = subscription();
        inner.create(&sub).await.unwrap();
        cache.insert_raw(&external_key("sub_1"), "{not json");

        let found = store.find_by_external_id("sub_1").await.unwrap();

        assert_eq!(found.map(|s| s.id), Some(sub.id));
    }
}
