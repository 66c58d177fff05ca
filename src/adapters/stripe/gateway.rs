//! Stripe implementation of the `PaymentGateway` port.
//!
//! Every call goes through the configured `RetryPolicy`. Mutating calls send
//! the caller's idempotency key in the `Idempotency-Key` header, unchanged
//! across attempts, so a retried create never makes a second subscription.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key).with_timeout(Duration::from_secs(30));
//! let gateway = StripeGateway::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderValue;
use secrecy::{ExposeSecret, SecretString};
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{
    CreateSubscriptionRequest, CreatedSubscription, PaymentError, PaymentErrorCode, PaymentGateway,
};

use super::retry::RetryPolicy;
use super::wire_types::{StripeCustomer, StripeErrorBody, StripeSearchResult, StripeSubscription};

const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,
    api_base_url: String,
    request_timeout: Duration,
    retry: RetryPolicy,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            api_base_url: "https://api.stripe.com".to_string(),
            request_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("api_key", &"[REDACTED]")
            .field("api_base_url", &self.api_base_url)
            .field("request_timeout", &self.request_timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

/// Stripe payment gateway.
pub struct StripeGateway {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                PaymentError::new(
                    PaymentErrorCode::ProviderError,
                    format!("Failed to build HTTP client: {}", e),
                )
            })?;

        Ok(Self {
            config,
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url, path)
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
    }

    fn with_idempotency_key(
        builder: reqwest::RequestBuilder,
        key: &str,
    ) -> Result<reqwest::RequestBuilder, PaymentError> {
        let value = HeaderValue::from_str(key).map_err(|_| {
            PaymentError::new(
                PaymentErrorCode::InvalidRequest,
                "Idempotency key contains invalid characters",
            )
        })?;
        Ok(builder.header(IDEMPOTENCY_KEY_HEADER, value))
    }

    /// Sends the request built by `build` under the retry policy.
    async fn execute<T, B>(&self, operation: &str, build: B) -> Result<T, PaymentError>
    where
        T: DeserializeOwned,
        B: Fn() -> Result<reqwest::RequestBuilder, PaymentError>,
    {
        self.config
            .retry
            .retry(operation, || {
                let request = build();
                async move {
                    let response = request?
                        .send()
                        .await
                        .map_err(|e| PaymentError::network(e.to_string()))?;
                    Self::decode(response).await
                }
            })
            .await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, PaymentError> {
        let status = response.status();

        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                PaymentError::new(
                    PaymentErrorCode::ProviderError,
                    format!("Failed to parse Stripe response: {}", e),
                )
            });
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<StripeErrorBody>(&body)
            .map(|b| b.error)
            .unwrap_or_default();
        let message = detail
            .message
            .clone()
            .unwrap_or_else(|| format!("Stripe API error (HTTP {})", status.as_u16()));

        let err = PaymentError::from_response(
            status.as_u16(),
            detail.error_type.as_deref(),
            detail.code.as_deref(),
            message,
        );
        tracing::debug!(
            status = status.as_u16(),
            code = %err.code,
            retryable = err.retryable,
            "Stripe call failed"
        );
        Err(err)
    }

    async fn find_customer(&self, user_id: &UserId) -> Result<Option<String>, PaymentError> {
        let query = format!(
            "metadata['user_id']:'{}'",
            user_id.as_str().replace('\'', "\\'")
        );
        let url = self.url("/v1/customers/search");

        let result: StripeSearchResult<StripeCustomer> = self
            .execute("search_customer", || {
                Ok(self
                    .authorized(self.http_client.get(&url))
                    .query(&[("query", query.as_str())]))
            })
            .await?;

        Ok(result.data.into_iter().find(|c| !c.deleted).map(|c| c.id))
    }
}

impl std::fmt::Debug for StripeGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeGateway")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn get_or_create_customer(
        &self,
        user_id: &UserId,
        email: &str,
    ) -> Result<String, PaymentError> {
        if let Some(customer_id) = self.find_customer(user_id).await? {
            return Ok(customer_id);
        }

        let url = self.url("/v1/customers");
        let key = format!("customer-{}", user_id);
        let params = [
            ("email", email.to_string()),
            ("metadata[user_id]", user_id.to_string()),
        ];

        let customer: StripeCustomer = self
            .execute("create_customer", || {
                let builder = self.authorized(self.http_client.post(&url)).form(&params);
                Self::with_idempotency_key(builder, &key)
            })
            .await?;

        tracing::info!(user_id = %user_id, customer_id = %customer.id, "Created Stripe customer");
        Ok(customer.id)
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<CreatedSubscription, PaymentError> {
        let url = self.url("/v1/subscriptions");
        let params = [
            ("customer", request.customer_id.clone()),
            ("items[0][price]", request.plan_id.clone()),
            ("payment_behavior", "default_incomplete".to_string()),
            ("expand[]", "latest_invoice.payment_intent".to_string()),
            ("metadata[user_id]", request.user_id.to_string()),
        ];

        let sub: StripeSubscription = self
            .execute("create_subscription", || {
                let builder = self.authorized(self.http_client.post(&url)).form(&params);
                Self::with_idempotency_key(builder, &request.idempotency_key)
            })
            .await?;

        let client_secret = sub.client_secret();
        Ok(CreatedSubscription {
            external_id: sub.id,
            client_secret,
            status: sub.status,
            current_period_start: sub.current_period_start.and_then(Timestamp::from_unix_secs),
            current_period_end: sub.current_period_end.and_then(Timestamp::from_unix_secs),
            trial_start: sub.trial_start.and_then(Timestamp::from_unix_secs),
            trial_end: sub.trial_end.and_then(Timestamp::from_unix_secs),
        })
    }

    async fn cancel_subscription(
        &self,
        external_id: &str,
        idempotency_key: &str,
    ) -> Result<(), PaymentError> {
        let url = self.url(&format!("/v1/subscriptions/{}", external_id));

        let result: Result<IgnoredAny, PaymentError> = self
            .execute("cancel_subscription", || {
                let builder = self.authorized(self.http_client.delete(&url));
                Self::with_idempotency_key(builder, idempotency_key)
            })
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if err.is_resource_missing() => {
                tracing::info!(
                    external_id,
                    "Subscription already gone at provider, treating cancel as done"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_redacts_api_key() {
        let config = StripeConfig::new("sk_test_secret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("sk_test_secret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let gateway =
            StripeGateway::new(StripeConfig::new("sk_test").with_base_url("http://localhost:1/"))
                .unwrap();
        assert_eq!(gateway.url("/v1/customers"), "http://localhost:1/v1/customers");
    }

    #[test]
    fn idempotency_key_rejects_control_characters() {
        let client = reqwest::Client::new();
        let result = StripeGateway::with_idempotency_key(client.get("http://x"), "bad\nkey");
        assert_eq!(result.unwrap_err().code, PaymentErrorCode::InvalidRequest);
    }
}
