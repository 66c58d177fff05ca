//! CreateSubscriptionHandler - starts a new provider subscription for a user.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::foundation::{ErrorCode, Timestamp, UserId};
use crate::domain::subscription::{
    ReconciliationCommand, Subscription, SubscriptionError, SubscriptionEvent, SubscriptionStatus,
};
use crate::ports::{
    CreateSubscriptionRequest, CreatedSubscription, EventPublisher, PaymentGateway,
    SubscriptionStore,
};

use super::publish_event;

#[derive(Debug, Clone)]
pub struct CreateSubscriptionCommand {
    pub user_id: UserId,
    pub plan_id: String,
    pub email: String,
    /// Caller-supplied key; one is generated when absent.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubscriptionResult {
    pub subscription: Subscription,
    /// Secret the client uses to confirm the first payment.
    pub client_secret: Option<String>,
}

pub struct CreateSubscriptionHandler {
    store: Arc<dyn SubscriptionStore>,
    gateway: Arc<dyn PaymentGateway>,
    event_publisher: Arc<dyn EventPublisher>,
}

impl CreateSubscriptionHandler {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        gateway: Arc<dyn PaymentGateway>,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            store,
            gateway,
            event_publisher,
        }
    }

    pub async fn handle(
        &self,
        cmd: CreateSubscriptionCommand,
    ) -> Result<CreateSubscriptionResult, SubscriptionError> {
        let plan_id = cmd.plan_id.trim();
        if plan_id.is_empty() {
            return Err(SubscriptionError::validation("plan_id", "must not be empty"));
        }
        let email = cmd.email.trim();
        if !email.contains('@') {
            return Err(SubscriptionError::validation("email", "must be an email address"));
        }
        let idempotency_key = match cmd.idempotency_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => format!("create-{}-{}", cmd.user_id, Uuid::new_v4()),
        };

        let customer_id = self
            .gateway
            .get_or_create_customer(&cmd.user_id, email)
            .await?;

        let created = self
            .gateway
            .create_subscription(CreateSubscriptionRequest {
                customer_id: customer_id.clone(),
                plan_id: plan_id.to_string(),
                user_id: cmd.user_id.clone(),
                idempotency_key,
            })
            .await?;

        let now = Timestamp::now();
        let mut subscription = Subscription::new_pending(
            cmd.user_id,
            created.external_id.clone(),
            plan_id,
            Some(customer_id),
            now,
        );
        subscription.reconcile(&initial_state(&created), now);

        if let Err(e) = self.store.create(&subscription).await {
            // Same idempotency key replayed: the provider returned the
            // subscription we already stored.
            if e.code == ErrorCode::VersionConflict {
                let existing = self
                    .store
                    .find_by_external_id_uncached(&created.external_id)
                    .await?;
                if let Some(existing) = existing {
                    return Ok(CreateSubscriptionResult {
                        subscription: existing,
                        client_secret: created.client_secret,
                    });
                }
            }
            tracing::error!(
                external_id = %created.external_id,
                error = %e,
                "Provider subscription created but not stored"
            );
            return Err(e.into());
        }

        tracing::info!(
            subscription_id = %subscription.id,
            external_id = %subscription.external_id,
            status = %subscription.status,
            "Subscription created"
        );
        let event = SubscriptionEvent::created(&subscription, now);
        publish_event(self.event_publisher.as_ref(), &event).await;

        Ok(CreateSubscriptionResult {
            subscription,
            client_secret: created.client_secret,
        })
    }
}

/// Provider's immediate answer as a reconciliation instruction.
fn initial_state(created: &CreatedSubscription) -> ReconciliationCommand {
    let status = SubscriptionStatus::from_provider(&created.status).unwrap_or_else(|| {
        tracing::warn!(status = %created.status, "Unknown provider status on create");
        SubscriptionStatus::Pending
    });
    ReconciliationCommand::new(created.external_id.clone(), status)
        .with_period(created.current_period_start, created.current_period_end)
        .with_trial(created.trial_start, created.trial_end)
}
