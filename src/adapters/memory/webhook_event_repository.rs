//! In-memory webhook event log.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, WebhookEventId};
use crate::domain::subscription::{WebhookEvent, WebhookEventStatus};
use crate::ports::{SaveResult, WebhookEventRepository};

#[derive(Default)]
pub struct InMemoryWebhookEventRepository {
    /// Insertion order.
    events: Mutex<Vec<WebhookEvent>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn events(&self) -> MutexGuard<'_, Vec<WebhookEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn all(&self) -> Vec<WebhookEvent> {
        self.events().clone()
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn create(&self, event: &WebhookEvent) -> Result<SaveResult, DomainError> {
        let mut events = self.events();
        if events.iter().any(|e| e.external_id == event.external_id) {
            return Ok(SaveResult::AlreadyExists);
        }
        events.push(event.clone());
        Ok(SaveResult::Inserted)
    }

    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<WebhookEvent>, DomainError> {
        Ok(self
            .events()
            .iter()
            .find(|e| e.external_id == external_id)
            .cloned())
    }

    async fn find_by_id(&self, id: &WebhookEventId) -> Result<Option<WebhookEvent>, DomainError> {
        Ok(self.events().iter().find(|e| &e.id == id).cloned())
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<WebhookEvent>, DomainError> {
        Ok(self
            .events()
            .iter()
            .rev()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update(&self, event: &WebhookEvent) -> Result<(), DomainError> {
        let mut events = self.events();
        match events.iter_mut().find(|e| e.id == event.id) {
            Some(row) => {
                *row = event.clone();
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::WebhookEventNotFound,
                format!("Webhook event not found: {}", event.id),
            )),
        }
    }

    async fn claim_for_retry(&self, event: &WebhookEvent) -> Result<bool, DomainError> {
        let mut events = self.events();
        match events
            .iter_mut()
            .find(|e| e.id == event.id && e.status != WebhookEventStatus::Pending)
        {
            Some(row) => {
                *row = event.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
