//! WebhookProcessor - routes and reconciles one recorded webhook event.
//!
//! Shared by live webhook delivery and manual retries from the event log.
//! The record's status, attempt count and error message are updated and
//! persisted whatever the outcome.

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{
    EventRouter, ProviderEvent, RouteOutcome, WebhookError, WebhookEvent,
};
use crate::ports::WebhookEventRepository;

use super::reconcile_subscription::{
    ReconcileSubscriptionCommand, ReconcileSubscriptionHandler, ReconcileSubscriptionResult,
};

/// What happened to an acknowledged webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A subscription changed.
    Processed,
    /// The subscription already matched the event.
    Unchanged,
    /// The event kind carries nothing to reconcile.
    Ignored { reason: String },
    /// The referenced subscription is not known locally.
    NotFoundLocally,
    /// This event id was already processed successfully.
    Duplicate,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "processed",
            WebhookOutcome::Unchanged => "unchanged",
            WebhookOutcome::Ignored { .. } => "ignored",
            WebhookOutcome::NotFoundLocally => "not_found",
            WebhookOutcome::Duplicate => "duplicate",
        }
    }
}

pub struct WebhookProcessor {
    router: EventRouter,
    reconciler: Arc<ReconcileSubscriptionHandler>,
    log: Arc<dyn WebhookEventRepository>,
}

impl WebhookProcessor {
    pub fn new(
        reconciler: Arc<ReconcileSubscriptionHandler>,
        log: Arc<dyn WebhookEventRepository>,
    ) -> Self {
        Self {
            router: EventRouter::new(),
            reconciler,
            log,
        }
    }

    /// Applies `event` and stores the result on `record`.
    pub async fn process(
        &self,
        record: &mut WebhookEvent,
        event: &ProviderEvent,
    ) -> Result<WebhookOutcome, WebhookError> {
        let result = self.apply(event).await;

        let now = Timestamp::now();
        match &result {
            Ok(_) => record.mark_processed(now),
            Err(e) => record.mark_failed(e.to_string(), now),
        }

        if let Err(e) = self.log.update(record).await {
            tracing::error!(
                event_id = %record.external_id,
                error = %e,
                "Failed to store webhook processing result"
            );
            // The provider must redeliver so the log catches up.
            if result.is_ok() {
                return Err(WebhookError::transient(e.to_string()));
            }
        }

        result
    }

    async fn apply(&self, event: &ProviderEvent) -> Result<WebhookOutcome, WebhookError> {
        let instruction = match self.router.route(event)? {
            RouteOutcome::NoOp { reason } => {
                tracing::debug!(event_id = %event.id, reason = %reason, "Webhook ignored");
                return Ok(WebhookOutcome::Ignored { reason });
            }
            RouteOutcome::Reconcile(instruction) => instruction,
        };

        let result = self
            .reconciler
            .handle(ReconcileSubscriptionCommand { instruction })
            .await
            .map_err(WebhookError::from)?;

        Ok(match result {
            ReconcileSubscriptionResult::Applied { .. } => WebhookOutcome::Processed,
            ReconcileSubscriptionResult::Unchanged { .. } => WebhookOutcome::Unchanged,
            ReconcileSubscriptionResult::NotFound { .. } => WebhookOutcome::NotFoundLocally,
        })
    }
}
