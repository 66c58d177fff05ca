//! HTTP DTOs for subscription, webhook and webhook-event endpoints.
//!
//! These types define the JSON request/response structure of the API.
//! They serve as the boundary between HTTP and the application layer.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{Subscription, WebhookEvent};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to start a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateSubscriptionRequest {
    /// Provider plan/price reference.
    pub plan_id: String,
    /// Email for the provider customer record.
    pub email: String,
}

/// Paging parameters for the webhook event log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListWebhookEventsParams {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    pub id: String,
    pub external_id: String,
    pub user_id: String,
    pub plan_id: String,
    pub customer_id: Option<String>,
    pub status: String,
    pub current_period_start: Option<String>,
    pub current_period_end: Option<String>,
    pub trial_start: Option<String>,
    pub trial_end: Option<String>,
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub version: i64,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(sub: Subscription) -> Self {
        Self {
            id: sub.id.to_string(),
            external_id: sub.external_id,
            user_id: sub.user_id.to_string(),
            plan_id: sub.plan_id,
            customer_id: sub.customer_id,
            status: sub.status.as_str().to_string(),
            current_period_start: rfc3339(sub.current_period_start),
            current_period_end: rfc3339(sub.current_period_end),
            trial_start: rfc3339(sub.trial_start),
            trial_end: rfc3339(sub.trial_end),
            cancel_at_period_end: sub.cancel_at_period_end,
            canceled_at: rfc3339(sub.canceled_at),
            created_at: sub.created_at.as_datetime().to_rfc3339(),
            updated_at: sub.updated_at.as_datetime().to_rfc3339(),
            version: sub.version,
        }
    }
}

/// Response for a created subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubscriptionResponse {
    pub subscription: SubscriptionResponse,
    /// Secret the client uses to confirm the first payment.
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionListResponse {
    pub subscriptions: Vec<SubscriptionResponse>,
}

/// Acknowledgement returned to the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookReceivedResponse {
    pub received: bool,
    pub outcome: String,
}

/// Logged webhook event. The raw payload is not exposed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventResponse {
    pub id: String,
    pub external_id: String,
    pub provider: String,
    pub event_type: String,
    pub status: String,
    pub resource_id: Option<String>,
    pub attempt_count: i32,
    pub last_attempt: Option<String>,
    pub processed_at: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<WebhookEvent> for WebhookEventResponse {
    fn from(event: WebhookEvent) -> Self {
        Self {
            id: event.id.to_string(),
            external_id: event.external_id,
            provider: event.provider,
            event_type: event.event_type,
            status: event.status.as_str().to_string(),
            resource_id: event.resource_id,
            attempt_count: event.attempt_count,
            last_attempt: rfc3339(event.last_attempt),
            processed_at: rfc3339(event.processed_at),
            error_message: event.error_message,
            created_at: event.created_at.as_datetime().to_rfc3339(),
            updated_at: event.updated_at.as_datetime().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventListResponse {
    pub events: Vec<WebhookEventResponse>,
    pub limit: u32,
    pub offset: u32,
}

fn rfc3339(ts: Option<Timestamp>) -> Option<String> {
    ts.map(|t| t.as_datetime().to_rfc3339())
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Response DTO
// ════════════════════════════════════════════════════════════════════════════════

/// Standard error response for API errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::domain::subscription::SubscriptionStatus;

    #[test]
    fn create_request_deserializes() {
        let json = r#"{"plan_id": "price_basic", "email": "user@example.com"}"#;
        let request: CreateSubscriptionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.plan_id, "price_basic");
        assert_eq!(request.email, "user@example.com");
    }

    #[test]
    fn paging_params_are_optional() {
        let params: ListWebhookEventsParams = serde_json::from_str("{}").unwrap();
        assert!(params.limit.is_none());
        assert!(params.offset.is_none());
    }

    #[test]
    fn subscription_response_uses_storage_status_and_rfc3339() {
        let mut sub = Subscription::new_pending(
            UserId::new("user-1").unwrap(),
            "sub_1",
            "price_1",
            Some("cus_1".to_string()),
            Timestamp::from_unix_secs(1_700_000_000).unwrap(),
        );
        sub.status = SubscriptionStatus::PastDue;

        let response = SubscriptionResponse::from(sub);

        assert_eq!(response.status, "past_due");
        assert_eq!(response.created_at, "2023-11-14T22:13:20+00:00");
        assert!(response.current_period_end.is_none());
        assert_eq!(response.version, 1);
    }

    #[test]
    fn error_response_has_code_and_message() {
        let json = serde_json::to_value(ErrorResponse::new("CONFLICT", "try again")).unwrap();
        assert_eq!(json["code"], "CONFLICT");
        assert_eq!(json["message"], "try again");
    }
}
