//! HandleProviderWebhookHandler - entry point for signed provider webhooks.
//!
//! Order of work:
//! 1. verify the signature over the raw body
//! 2. parse the envelope
//! 3. record the event in the log (unique on provider event id)
//! 4. route and reconcile, unless the event was already processed
//!
//! Errors map onto redelivery: signature and payload problems are final
//! (400), everything else asks the provider to try again (500).

use std::sync::Arc;

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{
    resource_id, ProviderEvent, SignatureVerifier, WebhookError, WebhookEvent,
};
use crate::ports::{SaveResult, WebhookEventRepository};

use super::process_webhook_event::{WebhookOutcome, WebhookProcessor};

#[derive(Debug, Clone)]
pub struct HandleProviderWebhookCommand {
    /// Provider segment from the request path.
    pub provider: String,
    pub payload: Vec<u8>,
    /// Raw signature header, if present.
    pub signature: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleProviderWebhookResult {
    pub event_id: String,
    pub outcome: WebhookOutcome,
}

pub struct HandleProviderWebhookHandler {
    provider: String,
    verifier: Arc<SignatureVerifier>,
    log: Arc<dyn WebhookEventRepository>,
    processor: Arc<WebhookProcessor>,
}

impl HandleProviderWebhookHandler {
    pub fn new(
        provider: impl Into<String>,
        verifier: Arc<SignatureVerifier>,
        log: Arc<dyn WebhookEventRepository>,
        processor: Arc<WebhookProcessor>,
    ) -> Self {
        Self {
            provider: provider.into(),
            verifier,
            log,
            processor,
        }
    }

    pub async fn handle(
        &self,
        cmd: HandleProviderWebhookCommand,
    ) -> Result<HandleProviderWebhookResult, WebhookError> {
        if cmd.provider != self.provider {
            return Err(WebhookError::UnknownProvider(cmd.provider));
        }

        self.verifier
            .verify(&cmd.payload, cmd.signature.as_deref())?;
        let event = ProviderEvent::parse(&cmd.payload)?;

        let kind = event.kind();
        let received = WebhookEvent::received(
            event.id.clone(),
            self.provider.clone(),
            kind.tag(),
            cmd.payload,
            resource_id(&event, &kind),
            Timestamp::now(),
        );

        let mut record = match self.log.create(&received).await.map_err(transient)? {
            SaveResult::Inserted => received,
            SaveResult::AlreadyExists => {
                let existing = self
                    .log
                    .find_by_external_id(&event.id)
                    .await
                    .map_err(transient)?
                    .ok_or_else(|| WebhookError::transient("webhook event vanished from log"))?;

                if existing.is_processed() {
                    tracing::debug!(event_id = %event.id, "Duplicate webhook delivery");
                    return Ok(HandleProviderWebhookResult {
                        event_id: event.id,
                        outcome: WebhookOutcome::Duplicate,
                    });
                }
                existing
            }
        };

        let outcome = self.processor.process(&mut record, &event).await?;
        tracing::info!(
            event_id = %event.id,
            event_type = %kind,
            outcome = outcome.as_str(),
            "Webhook handled"
        );

        Ok(HandleProviderWebhookResult {
            event_id: event.id,
            outcome,
        })
    }
}

fn transient(err: impl std::fmt::Display) -> WebhookError {
    WebhookError::transient(err.to_string())
}
