//! Subscription and webhook error types.
//!
//! # HTTP Status Mapping
//!
//! | Error | HTTP Status |
//! |-------|-------------|
//! | WebhookError::SignatureInvalid | 400 |
//! | WebhookError::BodyTooLarge | 400 |
//! | WebhookError::MalformedPayload | 400 |
//! | WebhookError::UnknownProvider | 404 |
//! | WebhookError::Transient | 500 |
//! | SubscriptionError::NotFound | 404 |
//! | SubscriptionError::ValidationFailed | 400 |
//! | SubscriptionError::PaymentFailed | 402 |
//! | SubscriptionError::Conflict | 409 |
//! | SubscriptionError::GatewayUnavailable | 502 |
//! | SubscriptionError::Infrastructure | 500 |

use http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode};

/// Errors on the inbound webhook path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// Signature header missing, malformed, stale, or not matching.
    #[error("Invalid signature: {0}")]
    SignatureInvalid(String),

    #[error("Body of {size} bytes exceeds limit of {limit}")]
    BodyTooLarge { size: usize, limit: usize },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Persistence or reconciliation failed; the provider should redeliver.
    #[error("Transient failure: {0}")]
    Transient(String),
}

impl WebhookError {
    pub fn signature(reason: impl Into<String>) -> Self {
        WebhookError::SignatureInvalid(reason.into())
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        WebhookError::MalformedPayload(reason.into())
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        WebhookError::Transient(reason.into())
    }

    /// Returns true if the provider should redeliver this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::Transient(_))
    }

    /// Status codes steer provider redelivery: 2xx acknowledged, 4xx dropped, 5xx retried.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::SignatureInvalid(_)
            | WebhookError::BodyTooLarge { .. }
            | WebhookError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            WebhookError::UnknownProvider(_) => StatusCode::NOT_FOUND,
            WebhookError::Transient(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            WebhookError::SignatureInvalid(_) => "SIGNATURE_INVALID",
            WebhookError::BodyTooLarge { .. } => "BODY_TOO_LARGE",
            WebhookError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            WebhookError::UnknownProvider(_) => "UNKNOWN_PROVIDER",
            WebhookError::Transient(_) => "TRANSIENT_ERROR",
        }
    }
}

/// Errors from subscription commands and queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Subscription does not exist, or belongs to someone else.
    NotFound(String),

    WebhookEventNotFound(String),

    ValidationFailed { field: String, message: String },

    /// Provider refused the operation permanently (card, validation, auth).
    PaymentFailed { reason: String },

    /// Provider kept failing transiently until retries ran out.
    GatewayUnavailable(String),

    /// Concurrent modification that could not be resolved.
    Conflict(String),

    Infrastructure(String),
}

impl SubscriptionError {
    pub fn not_found(id: impl ToString) -> Self {
        SubscriptionError::NotFound(id.to_string())
    }

    pub fn webhook_event_not_found(id: impl ToString) -> Self {
        SubscriptionError::WebhookEventNotFound(id.to_string())
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        SubscriptionError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn payment_failed(reason: impl Into<String>) -> Self {
        SubscriptionError::PaymentFailed {
            reason: reason.into(),
        }
    }

    pub fn gateway_unavailable(message: impl Into<String>) -> Self {
        SubscriptionError::GatewayUnavailable(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        SubscriptionError::Conflict(message.into())
    }

    pub fn infrastructure(message: impl Into<String>) -> Self {
        SubscriptionError::Infrastructure(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SubscriptionError::NotFound(_) => ErrorCode::SubscriptionNotFound,
            SubscriptionError::WebhookEventNotFound(_) => ErrorCode::WebhookEventNotFound,
            SubscriptionError::ValidationFailed { .. } => ErrorCode::ValidationFailed,
            SubscriptionError::PaymentFailed { .. } => ErrorCode::PaymentFailed,
            SubscriptionError::GatewayUnavailable(_) => ErrorCode::GatewayUnavailable,
            SubscriptionError::Conflict(_) => ErrorCode::VersionConflict,
            SubscriptionError::Infrastructure(_) => ErrorCode::DatabaseError,
        }
    }

    pub fn message(&self) -> String {
        match self {
            SubscriptionError::NotFound(id) => format!("Subscription not found: {}", id),
            SubscriptionError::WebhookEventNotFound(id) => {
                format!("Webhook event not found: {}", id)
            }
            SubscriptionError::ValidationFailed { field, message } => {
                format!("Validation failed for '{}': {}", field, message)
            }
            SubscriptionError::PaymentFailed { reason } => format!("Payment failed: {}", reason),
            SubscriptionError::GatewayUnavailable(msg) => {
                format!("Payment provider unavailable: {}", msg)
            }
            SubscriptionError::Conflict(msg) => format!("Conflict: {}", msg),
            SubscriptionError::Infrastructure(msg) => format!("Error: {}", msg),
        }
    }

    /// True when the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SubscriptionError::GatewayUnavailable(_)
                | SubscriptionError::Conflict(_)
                | SubscriptionError::Infrastructure(_)
        )
    }
}

impl std::fmt::Display for SubscriptionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for SubscriptionError {}

impl From<DomainError> for SubscriptionError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => SubscriptionError::ValidationFailed {
                field: err
                    .details
                    .get("field")
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.message,
            },
            ErrorCode::SubscriptionNotFound => SubscriptionError::NotFound(err.message),
            ErrorCode::WebhookEventNotFound => SubscriptionError::WebhookEventNotFound(err.message),
            ErrorCode::VersionConflict => SubscriptionError::Conflict(err.message),
            ErrorCode::PaymentFailed => SubscriptionError::PaymentFailed { reason: err.message },
            ErrorCode::GatewayUnavailable => SubscriptionError::GatewayUnavailable(err.message),
            _ => SubscriptionError::Infrastructure(err.to_string()),
        }
    }
}

impl From<SubscriptionError> for DomainError {
    fn from(err: SubscriptionError) -> Self {
        DomainError::new(err.code(), err.message())
    }
}

impl From<SubscriptionError> for WebhookError {
    fn from(err: SubscriptionError) -> Self {
        match err {
            SubscriptionError::ValidationFailed { field, message } => {
                WebhookError::MalformedPayload(format!("{}: {}", field, message))
            }
            other => WebhookError::Transient(other.message()),
        }
    }
}
