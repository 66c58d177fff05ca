//! Provider webhook event model.
//!
//! The envelope fields every provider event carries are typed; the object
//! that triggered the event stays a JSON value because its shape depends on
//! the event kind and on the provider API version.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::WebhookError;

/// Provider webhook event envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEvent {
    /// Provider event id (evt_xxx); used to detect redelivery.
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp of event creation.
    #[serde(default)]
    pub created: i64,

    pub data: ProviderEventData,

    #[serde(default)]
    pub livemode: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Body exactly as received, for replay and for fields not modeled here.
    #[serde(skip)]
    pub raw: Vec<u8>,
}

/// Container for event-specific data.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEventData {
    /// The object that triggered the event (shape depends on event kind).
    pub object: serde_json::Value,

    /// Previous values for updated attributes (update events only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_attributes: Option<serde_json::Value>,
}

impl ProviderEvent {
    /// Parses a verified webhook body.
    pub fn parse(body: &[u8]) -> Result<Self, WebhookError> {
        let mut event: ProviderEvent =
            serde_json::from_slice(body).map_err(|e| WebhookError::malformed(e.to_string()))?;
        if event.id.trim().is_empty() {
            return Err(WebhookError::malformed("event id is empty"));
        }
        if !event.data.object.is_object() {
            return Err(WebhookError::malformed("data.object is not an object"));
        }
        event.raw = body.to_vec();
        Ok(event)
    }

    pub fn kind(&self) -> ProviderEventKind {
        ProviderEventKind::from_type(&self.event_type)
    }

    /// The `object` discriminator of the triggering object, if present.
    pub fn object_type(&self) -> Option<&str> {
        self.data.object.get("object").and_then(|v| v.as_str())
    }
}

/// Event kinds the reconciler distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ProviderEventKind {
    PaymentSucceeded,
    PaymentFailed,
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    SubscriptionTrialEnding,
    CustomerCreated,
    CustomerUpdated,
    CustomerDeleted,
    /// Anything not modeled yet; acknowledged and logged.
    Unknown(String),
}

impl ProviderEventKind {
    pub fn from_type(event_type: &str) -> Self {
        match event_type {
            "invoice.payment_succeeded" | "invoice.paid" => Self::PaymentSucceeded,
            "invoice.payment_failed" => Self::PaymentFailed,
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "customer.subscription.trial_will_end" => Self::SubscriptionTrialEnding,
            "customer.created" => Self::CustomerCreated,
            "customer.updated" => Self::CustomerUpdated,
            "customer.deleted" => Self::CustomerDeleted,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Short tag stored in the webhook event log.
    pub fn tag(&self) -> &str {
        match self {
            Self::PaymentSucceeded => "payment_succeeded",
            Self::PaymentFailed => "payment_failed",
            Self::SubscriptionCreated => "subscription_created",
            Self::SubscriptionUpdated => "subscription_updated",
            Self::SubscriptionDeleted => "subscription_deleted",
            Self::SubscriptionTrialEnding => "subscription_trial_ending",
            Self::CustomerCreated => "customer_created",
            Self::CustomerUpdated => "customer_updated",
            Self::CustomerDeleted => "customer_deleted",
            Self::Unknown(raw) => raw.as_str(),
        }
    }

    pub fn is_subscription_event(&self) -> bool {
        matches!(
            self,
            Self::SubscriptionCreated
                | Self::SubscriptionUpdated
                | Self::SubscriptionDeleted
                | Self::SubscriptionTrialEnding
        )
    }
}

impl fmt::Display for ProviderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
