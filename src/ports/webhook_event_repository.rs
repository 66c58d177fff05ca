//! WebhookEventRepository port - the append-only log of received webhooks.
//!
//! The provider may deliver the same event more than once. The repository
//! enforces one row per provider event id, so the first `create` wins and
//! every later delivery sees `AlreadyExists`.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, WebhookEventId};
use crate::domain::subscription::WebhookEvent;

/// Result of attempting to record a webhook event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// First time seeing this event.
    Inserted,
    /// Duplicate delivery.
    AlreadyExists,
}

#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Inserts with `ON CONFLICT DO NOTHING` semantics on the external id.
    async fn create(&self, event: &WebhookEvent) -> Result<SaveResult, DomainError>;

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<WebhookEvent>, DomainError>;

    async fn find_by_id(&self, id: &WebhookEventId) -> Result<Option<WebhookEvent>, DomainError>;

    /// Newest first.
    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<WebhookEvent>, DomainError>;

    /// Persists status, attempt bookkeeping and error message.
    async fn update(&self, event: &WebhookEvent) -> Result<(), DomainError>;

    /// Stores `event` (already reset to pending) only if the stored row is
    /// not pending. Returns false when another caller claimed it first.
    async fn claim_for_retry(&self, event: &WebhookEvent) -> Result<bool, DomainError>;
}
