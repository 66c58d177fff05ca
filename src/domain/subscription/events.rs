//! Subscription domain events.
//!
//! Each event carries the post-change snapshot so consumers never need to
//! read back from the store. Events are keyed by subscription id, which keeps
//! per-subscription ordering on the bus.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    domain_event, EventEnvelope, EventId, SerializableDomainEvent, SubscriptionId, Timestamp,
};

use super::{Subscription, SubscriptionStatus};

pub const TOPIC_SUBSCRIPTION_CREATED: &str = "subscription_created";
pub const TOPIC_SUBSCRIPTION_CANCELED: &str = "subscription_cancelled";
pub const TOPIC_SUBSCRIPTION_UPDATED: &str = "subscription_updated";

/// A subscription was created through the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCreated {
    pub event_id: EventId,
    pub subscription_id: SubscriptionId,
    pub subscription: Subscription,
    pub occurred_at: Timestamp,
}

domain_event!(
    SubscriptionCreated,
    event_type = "subscription.created.v1",
    aggregate_id = subscription_id,
    aggregate_type = "Subscription",
    occurred_at = occurred_at,
    event_id = event_id
);

/// A subscription reached the terminal canceled state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionCanceled {
    pub event_id: EventId,
    pub subscription_id: SubscriptionId,
    pub subscription: Subscription,
    pub previous_status: SubscriptionStatus,
    pub occurred_at: Timestamp,
}

domain_event!(
    SubscriptionCanceled,
    event_type = "subscription.canceled.v1",
    aggregate_id = subscription_id,
    aggregate_type = "Subscription",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Any other reconciled change (status, period, plan, trial, scheduled cancel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionUpdated {
    pub event_id: EventId,
    pub subscription_id: SubscriptionId,
    pub subscription: Subscription,
    pub previous_status: SubscriptionStatus,
    pub occurred_at: Timestamp,
}

domain_event!(
    SubscriptionUpdated,
    event_type = "subscription.updated.v1",
    aggregate_id = subscription_id,
    aggregate_type = "Subscription",
    occurred_at = occurred_at,
    event_id = event_id
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEvent {
    Created(SubscriptionCreated),
    Canceled(SubscriptionCanceled),
    Updated(SubscriptionUpdated),
}

impl SubscriptionEvent {
    pub fn created(subscription: &Subscription, now: Timestamp) -> Self {
        SubscriptionEvent::Created(SubscriptionCreated {
            event_id: EventId::new(),
            subscription_id: subscription.id,
            subscription: subscription.clone(),
            occurred_at: now,
        })
    }

    /// Picks the event for a persisted change from `previous_status`.
    pub fn changed(
        subscription: &Subscription,
        previous_status: SubscriptionStatus,
        now: Timestamp,
    ) -> Self {
        if subscription.status.is_canceled() && !previous_status.is_canceled() {
            SubscriptionEvent::Canceled(SubscriptionCanceled {
                event_id: EventId::new(),
                subscription_id: subscription.id,
                subscription: subscription.clone(),
                previous_status,
                occurred_at: now,
            })
        } else {
            SubscriptionEvent::Updated(SubscriptionUpdated {
                event_id: EventId::new(),
                subscription_id: subscription.id,
                subscription: subscription.clone(),
                previous_status,
                occurred_at: now,
            })
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            SubscriptionEvent::Created(_) => TOPIC_SUBSCRIPTION_CREATED,
            SubscriptionEvent::Canceled(_) => TOPIC_SUBSCRIPTION_CANCELED,
            SubscriptionEvent::Updated(_) => TOPIC_SUBSCRIPTION_UPDATED,
        }
    }

    /// Partitioning key on the bus.
    pub fn key(&self) -> String {
        self.subscription().id.to_string()
    }

    pub fn subscription(&self) -> &Subscription {
        match self {
            SubscriptionEvent::Created(e) => &e.subscription,
            SubscriptionEvent::Canceled(e) => &e.subscription,
            SubscriptionEvent::Updated(e) => &e.subscription,
        }
    }

    pub fn to_envelope(&self) -> Result<EventEnvelope, serde_json::Error> {
        let envelope = match self {
            SubscriptionEvent::Created(e) => e.to_envelope()?,
            SubscriptionEvent::Canceled(e) => e.to_envelope()?,
            SubscriptionEvent::Updated(e) => e.to_envelope()?,
        };
        Ok(envelope.with_user_id(self.subscription().user_id.as_str()))
    }
}
