//! PaymentGateway port - synchronous calls to the external payment provider.
//!
//! Every mutating call carries a caller-supplied idempotency key so that a
//! retried call (by the adapter's backoff loop or by the client) cannot create
//! duplicate provider-side resources.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::domain::subscription::SubscriptionError;

/// Port for provider operations on the create/cancel path.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Finds the provider customer for `user_id`, creating one if needed.
    async fn get_or_create_customer(
        &self,
        user_id: &UserId,
        email: &str,
    ) -> Result<String, PaymentError>;

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<CreatedSubscription, PaymentError>;

    /// Cancels immediately. A subscription the provider no longer knows is
    /// treated as already canceled.
    async fn cancel_subscription(
        &self,
        external_id: &str,
        idempotency_key: &str,
    ) -> Result<(), PaymentError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSubscriptionRequest {
    pub customer_id: String,
    pub plan_id: String,
    pub user_id: UserId,
    pub idempotency_key: String,
}

/// Provider's immediate answer to a create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSubscription {
    pub external_id: String,
    /// Secret the client uses to confirm the first payment.
    pub client_secret: Option<String>,
    /// Raw provider status (commonly `incomplete`).
    pub status: String,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub trial_start: Option<Timestamp>,
    pub trial_end: Option<Timestamp>,
}

/// Errors from payment provider operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentError {
    pub code: PaymentErrorCode,
    pub message: String,
    /// Provider's own error code (e.g. `resource_missing`).
    pub provider_code: Option<String>,
    pub retryable: bool,
}

impl PaymentError {
    pub fn new(code: PaymentErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            provider_code: None,
            retryable: code.is_retryable(),
        }
    }

    pub fn with_provider_code(mut self, code: impl Into<String>) -> Self {
        self.provider_code = Some(code.into());
        self
    }

    /// Connection or transport failure.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(PaymentErrorCode::NetworkError, message)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(PaymentErrorCode::NotFound, format!("{} not found", resource))
            .with_provider_code("resource_missing")
    }

    /// Classifies a failed provider response.
    ///
    /// `error_type` and `provider_code` come from the provider's error body
    /// when it could be parsed.
    pub fn from_response(
        status: u16,
        error_type: Option<&str>,
        provider_code: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        let code = match (status, error_type, provider_code) {
            (429, _, _) => PaymentErrorCode::RateLimitExceeded,
            (_, Some("api_connection_error"), _) => PaymentErrorCode::NetworkError,
            (501, _, _) => PaymentErrorCode::ProviderError,
            (500..=599, _, _) => PaymentErrorCode::ProviderUnavailable,
            (404, _, _) | (_, _, Some("resource_missing")) => PaymentErrorCode::NotFound,
            (401 | 403, _, _) | (_, Some("authentication_error"), _) => {
                PaymentErrorCode::AuthenticationError
            }
            (_, Some("card_error"), _) => PaymentErrorCode::CardDeclined,
            (_, Some("invalid_request_error"), _) | (400..=499, _, _) => {
                PaymentErrorCode::InvalidRequest
            }
            _ => PaymentErrorCode::Unknown,
        };

        let mut err = Self::new(code, message);
        if let Some(provider_code) = provider_code {
            err = err.with_provider_code(provider_code);
        }
        err
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// The provider no longer knows the resource.
    pub fn is_resource_missing(&self) -> bool {
        self.code == PaymentErrorCode::NotFound
            || self.provider_code.as_deref() == Some("resource_missing")
    }
}

impl std::fmt::Display for PaymentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PaymentError {}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        let code = if err.retryable {
            ErrorCode::GatewayUnavailable
        } else {
            ErrorCode::PaymentFailed
        };
        DomainError::new(code, err.message)
    }
}

impl From<PaymentError> for SubscriptionError {
    fn from(err: PaymentError) -> Self {
        if err.retryable {
            SubscriptionError::gateway_unavailable(err.to_string())
        } else {
            SubscriptionError::payment_failed(err.to_string())
        }
    }
}

/// Payment error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentErrorCode {
    NetworkError,
    RateLimitExceeded,
    /// Provider 5xx other than "not implemented".
    ProviderUnavailable,
    AuthenticationError,
    CardDeclined,
    InvalidRequest,
    NotFound,
    /// Provider answered with an error that retrying will not fix.
    ProviderError,
    Unknown,
}

impl PaymentErrorCode {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentErrorCode::NetworkError
                | PaymentErrorCode::RateLimitExceeded
                | PaymentErrorCode::ProviderUnavailable
        )
    }
}

impl std::fmt::Display for PaymentErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentErrorCode::NetworkError => "network_error",
            PaymentErrorCode::RateLimitExceeded => "rate_limit_exceeded",
            PaymentErrorCode::ProviderUnavailable => "provider_unavailable",
            PaymentErrorCode::AuthenticationError => "authentication_error",
            PaymentErrorCode::CardDeclined => "card_declined",
            PaymentErrorCode::InvalidRequest => "invalid_request",
            PaymentErrorCode::NotFound => "not_found",
            PaymentErrorCode::ProviderError => "provider_error",
            PaymentErrorCode::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}
