//! HTTP handlers for subscription endpoints.
//!
//! These handlers connect Axum routes to application layer command/query handlers.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{FromRef, FromRequestParts, Json, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::adapters::metrics::MetricsCollector;

use crate::application::handlers::subscription::{
    CancelSubscriptionCommand, CancelSubscriptionHandler, CreateSubscriptionCommand,
    CreateSubscriptionHandler, GetSubscriptionHandler, GetSubscriptionQuery,
    GetWebhookEventHandler, HandleProviderWebhookCommand, HandleProviderWebhookHandler,
    ListSubscriptionsHandler, ListSubscriptionsQuery, ListWebhookEventsHandler,
    ListWebhookEventsQuery, ReconcileSubscriptionHandler, RetryWebhookEventCommand,
    RetryWebhookEventHandler, WebhookProcessor,
};
use crate::domain::foundation::{SubscriptionId, UserId, WebhookEventId};
use crate::domain::subscription::{
    SignatureVerifier, SubscriptionError, WebhookError, MAX_BODY_BYTES,
};
use crate::ports::{EventPublisher, PaymentGateway, SubscriptionStore, WebhookEventRepository};

use super::dto::{
    CreateSubscriptionRequest, CreateSubscriptionResponse, ErrorResponse,
    ListWebhookEventsParams, SubscriptionListResponse, SubscriptionResponse,
    WebhookEventListResponse, WebhookEventResponse, WebhookReceivedResponse,
};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const USER_ID_HEADER: &str = "X-User-Id";
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
pub const OPERATOR_TOKEN_HEADER: &str = "X-Operator-Token";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared application state containing all dependencies.
///
/// Cloned per request; handlers are assembled on demand from the Arc-wrapped
/// ports.
#[derive(Clone)]
pub struct SubscriptionAppState {
    pub store: Arc<dyn SubscriptionStore>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub event_publisher: Arc<dyn EventPublisher>,
    pub webhook_log: Arc<dyn WebhookEventRepository>,
    pub verifier: Arc<SignatureVerifier>,
    /// The one provider accepted on `/webhooks/{provider}`.
    pub provider: String,
    pub metrics: MetricsCollector,
    /// Required on `/webhook-events`; `None` closes those endpoints.
    pub operator_token: Option<Arc<SecretString>>,
}

impl FromRef<SubscriptionAppState> for MetricsCollector {
    fn from_ref(state: &SubscriptionAppState) -> Self {
        state.metrics.clone()
    }
}

impl SubscriptionAppState {
    fn reconciler(&self) -> Arc<ReconcileSubscriptionHandler> {
        Arc::new(ReconcileSubscriptionHandler::new(
            self.store.clone(),
            self.event_publisher.clone(),
        ))
    }

    fn processor(&self) -> Arc<WebhookProcessor> {
        Arc::new(WebhookProcessor::new(self.reconciler(), self.webhook_log.clone()))
    }

    pub fn create_subscription_handler(&self) -> CreateSubscriptionHandler {
        CreateSubscriptionHandler::new(
            self.store.clone(),
            self.gateway.clone(),
            self.event_publisher.clone(),
        )
    }

    pub fn cancel_subscription_handler(&self) -> CancelSubscriptionHandler {
        CancelSubscriptionHandler::new(self.store.clone(), self.gateway.clone(), self.reconciler())
    }

    pub fn get_subscription_handler(&self) -> GetSubscriptionHandler {
        GetSubscriptionHandler::new(self.store.clone())
    }

    pub fn list_subscriptions_handler(&self) -> ListSubscriptionsHandler {
        ListSubscriptionsHandler::new(self.store.clone())
    }

    pub fn webhook_handler(&self) -> HandleProviderWebhookHandler {
        HandleProviderWebhookHandler::new(
            self.provider.clone(),
            self.verifier.clone(),
            self.webhook_log.clone(),
            self.processor(),
        )
    }

    pub fn list_webhook_events_handler(&self) -> ListWebhookEventsHandler {
        ListWebhookEventsHandler::new(self.webhook_log.clone())
    }

    pub fn get_webhook_event_handler(&self) -> GetWebhookEventHandler {
        GetWebhookEventHandler::new(self.webhook_log.clone())
    }

    pub fn retry_webhook_event_handler(&self) -> RetryWebhookEventHandler {
        RetryWebhookEventHandler::new(self.webhook_log.clone(), self.processor())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// User Context
// ════════════════════════════════════════════════════════════════════════════════

/// Caller identity, taken from the `X-User-Id` header set by the gateway in
/// front of this service.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Rejection type for AuthenticatedUser extraction.
pub struct AuthenticationRequired;

impl IntoResponse for AuthenticationRequired {
    fn into_response(self) -> Response {
        let error = ErrorResponse::new("AUTHENTICATION_REQUIRED", "Authentication is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AuthenticationRequired;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| UserId::new(s).ok())
            .ok_or(AuthenticationRequired)?;

        Ok(AuthenticatedUser { user_id })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Operator Access
// ════════════════════════════════════════════════════════════════════════════════

/// Proof that the request carried the configured `X-Operator-Token`.
#[derive(Debug, Clone, Copy)]
pub struct OperatorAccess;

/// Rejection type for OperatorAccess extraction.
pub struct OperatorTokenRequired;

impl IntoResponse for OperatorTokenRequired {
    fn into_response(self) -> Response {
        let error =
            ErrorResponse::new("OPERATOR_TOKEN_REQUIRED", "A valid operator token is required");
        (StatusCode::UNAUTHORIZED, Json(error)).into_response()
    }
}

#[async_trait]
impl FromRequestParts<SubscriptionAppState> for OperatorAccess {
    type Rejection = OperatorTokenRequired;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SubscriptionAppState,
    ) -> Result<Self, Self::Rejection> {
        let expected = state.operator_token.as_ref().ok_or(OperatorTokenRequired)?;
        let presented = parts
            .headers
            .get(OPERATOR_TOKEN_HEADER)
            .map(|v| v.as_bytes())
            .ok_or(OperatorTokenRequired)?;

        let expected = expected.expose_secret().as_bytes();
        if expected.is_empty() || expected.ct_eq(presented).unwrap_u8() != 1 {
            tracing::warn!("Rejected operator request");
            return Err(OperatorTokenRequired);
        }
        Ok(OperatorAccess)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscription Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// POST /subscriptions - Start a subscription with the provider
pub async fn create_subscription(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(request): Json<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = CreateSubscriptionCommand {
        user_id: user.user_id,
        plan_id: request.plan_id,
        email: request.email,
        idempotency_key,
    };
    let result = state.create_subscription_handler().handle(cmd).await?;

    let response = CreateSubscriptionResponse {
        subscription: SubscriptionResponse::from(result.subscription),
        client_secret: result.client_secret,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /subscriptions - List the caller's subscriptions
pub async fn list_subscriptions(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let subscriptions = state
        .list_subscriptions_handler()
        .handle(ListSubscriptionsQuery {
            user_id: user.user_id,
        })
        .await?;

    Ok(Json(SubscriptionListResponse {
        subscriptions: subscriptions.into_iter().map(SubscriptionResponse::from).collect(),
    }))
}

/// GET /subscriptions/:id - Get one of the caller's subscriptions
pub async fn get_subscription(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let subscription_id = parse_subscription_id(&id)?;
    let subscription = state
        .get_subscription_handler()
        .handle(GetSubscriptionQuery {
            user_id: user.user_id,
            subscription_id,
        })
        .await?;

    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// POST /subscriptions/:id/cancel - Cancel immediately
pub async fn cancel_subscription(
    State(state): State<SubscriptionAppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let subscription_id = parse_subscription_id(&id)?;
    let result = state
        .cancel_subscription_handler()
        .handle(CancelSubscriptionCommand {
            user_id: user.user_id,
            subscription_id,
        })
        .await?;

    Ok(Json(SubscriptionResponse::from(result.subscription)))
}

fn parse_subscription_id(raw: &str) -> Result<SubscriptionId, SubscriptionError> {
    raw.parse()
        .map_err(|_| SubscriptionError::validation("id", "must be a UUID"))
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Endpoint
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/:provider - Receive a signed provider event
pub async fn handle_webhook(
    State(state): State<SubscriptionAppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, WebhookApiError> {
    // Unknown providers share one label to keep the series bounded.
    let provider_label = if provider == state.provider {
        state.provider.clone()
    } else {
        "unknown".to_string()
    };

    let result = receive_webhook(&state, provider, &headers, body).await;

    let outcome = match &result {
        Ok(outcome) => outcome.to_string(),
        Err(e) => e.code().to_ascii_lowercase(),
    };
    state.metrics.record_webhook(&provider_label, &outcome);

    let outcome = result?;
    Ok(Json(WebhookReceivedResponse {
        received: true,
        outcome: outcome.to_string(),
    }))
}

async fn receive_webhook(
    state: &SubscriptionAppState,
    provider: String,
    headers: &HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<&'static str, WebhookError> {
    let body = body.map_err(|rejection| body_rejection(rejection, headers))?;
    if body.len() > MAX_BODY_BYTES {
        return Err(WebhookError::BodyTooLarge {
            size: body.len(),
            limit: MAX_BODY_BYTES,
        });
    }

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let cmd = HandleProviderWebhookCommand {
        provider,
        payload: body.to_vec(),
        signature,
    };
    let result = state.webhook_handler().handle(cmd).await?;
    Ok(result.outcome.as_str())
}

/// The body limit layer stops reading at `MAX_BODY_BYTES`, so the reported
/// size comes from `Content-Length` when the sender set one.
fn body_rejection(rejection: BytesRejection, headers: &HeaderMap) -> WebhookError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let size = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(MAX_BODY_BYTES + 1);
        return WebhookError::BodyTooLarge {
            size,
            limit: MAX_BODY_BYTES,
        };
    }
    WebhookError::malformed(rejection.body_text())
}

// ════════════════════════════════════════════════════════════════════════════════
// Webhook Event Log Endpoints
// ════════════════════════════════════════════════════════════════════════════════

/// GET /webhook-events - Page through the event log, newest first
pub async fn list_webhook_events(
    State(state): State<SubscriptionAppState>,
    _operator: OperatorAccess,
    Query(params): Query<ListWebhookEventsParams>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let query = ListWebhookEventsQuery {
        limit: params.limit,
        offset: params.offset,
    };
    let limit = query.effective_limit();
    let offset = query.offset.unwrap_or(0);
    let events = state.list_webhook_events_handler().handle(query).await?;

    Ok(Json(WebhookEventListResponse {
        events: events.into_iter().map(WebhookEventResponse::from).collect(),
        limit,
        offset,
    }))
}

/// GET /webhook-events/:id
pub async fn get_webhook_event(
    State(state): State<SubscriptionAppState>,
    _operator: OperatorAccess,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let id = parse_webhook_event_id(&id)?;
    let event = state.get_webhook_event_handler().handle(id).await?;
    Ok(Json(WebhookEventResponse::from(event)))
}

/// POST /webhook-events/:id/retry - Reprocess a logged event
pub async fn retry_webhook_event(
    State(state): State<SubscriptionAppState>,
    _operator: OperatorAccess,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, SubscriptionApiError> {
    let id = parse_webhook_event_id(&id)?;
    let event = state
        .retry_webhook_event_handler()
        .handle(RetryWebhookEventCommand { id })
        .await?;
    Ok(Json(WebhookEventResponse::from(event)))
}

fn parse_webhook_event_id(raw: &str) -> Result<WebhookEventId, SubscriptionError> {
    raw.parse()
        .map_err(|_| SubscriptionError::validation("id", "must be a UUID"))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts subscription errors to HTTP responses.
#[derive(Debug)]
pub struct SubscriptionApiError(SubscriptionError);

impl From<SubscriptionError> for SubscriptionApiError {
    fn from(err: SubscriptionError) -> Self {
        Self(err)
    }
}

impl SubscriptionApiError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            SubscriptionError::NotFound(_) => (StatusCode::NOT_FOUND, "SUBSCRIPTION_NOT_FOUND"),
            SubscriptionError::WebhookEventNotFound(_) => {
                (StatusCode::NOT_FOUND, "WEBHOOK_EVENT_NOT_FOUND")
            }
            SubscriptionError::ValidationFailed { .. } => {
                (StatusCode::BAD_REQUEST, "VALIDATION_FAILED")
            }
            SubscriptionError::PaymentFailed { .. } => {
                (StatusCode::PAYMENT_REQUIRED, "PAYMENT_FAILED")
            }
            SubscriptionError::GatewayUnavailable(_) => {
                (StatusCode::BAD_GATEWAY, "GATEWAY_UNAVAILABLE")
            }
            SubscriptionError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            SubscriptionError::Infrastructure(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        }
    }
}

impl IntoResponse for SubscriptionApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        let message = match &self.0 {
            SubscriptionError::Infrastructure(_) => {
                tracing::error!(error = %self.0, "Request failed");
                "An internal error occurred".to_string()
            }
            SubscriptionError::GatewayUnavailable(_) => {
                tracing::warn!(error = %self.0, "Payment provider unavailable");
                "Payment provider is temporarily unavailable".to_string()
            }
            other => other.message(),
        };

        (status, Json(ErrorResponse::new(error_code, message))).into_response()
    }
}

/// Webhook failures; the status code steers provider redelivery.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();
        let message = match &self.0 {
            WebhookError::Transient(_) => {
                tracing::error!(error = %self.0, "Webhook processing failed, provider will redeliver");
                "Temporary failure".to_string()
            }
            WebhookError::SignatureInvalid(_) => {
                tracing::warn!(error = %self.0, "Rejected webhook signature");
                "Invalid signature".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorResponse::new(self.0.code(), message))).into_response()
    }
}
