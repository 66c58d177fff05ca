//! SubscriptionStore port - durable storage for subscriptions.
//!
//! Updates are guarded by an optimistic version check: the write only lands
//! when the stored version still equals the version the caller read.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SubscriptionId, UserId};
use crate::domain::subscription::Subscription;

/// Result of a version-checked update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Written; carries the stored row with its incremented version.
    Updated(Subscription),
    NotFound,
    /// Someone else wrote first.
    VersionConflict,
}

/// Port for subscription persistence.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Looks up by the provider's subscription id.
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError>;

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError>;

    /// Reads from the store of record, skipping any cache in front of it.
    ///
    /// Write paths decide "no change" from what they read, so they must not
    /// see a stale copy.
    async fn find_by_external_id_uncached(
        &self,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        self.find_by_external_id(external_id).await
    }

    async fn find_by_id_uncached(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, DomainError> {
        self.find_by_id(id).await
    }

    /// All subscriptions for a user, newest first.
    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Vec<Subscription>, DomainError>;

    /// Inserts a new row. Fails with `VersionConflict` if the external id is taken.
    async fn create(&self, subscription: &Subscription) -> Result<(), DomainError>;

    /// Writes `subscription` if the stored version equals `expected_version`.
    async fn update(
        &self,
        subscription: &Subscription,
        expected_version: i64,
    ) -> Result<UpdateOutcome, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_store_is_object_safe() {
        fn _accepts_dyn(_store: &dyn SubscriptionStore) {}
    }

    #[test]
    fn update_outcomes_are_distinct() {
        assert_ne!(UpdateOutcome::NotFound, UpdateOutcome::VersionConflict);
    }
}
