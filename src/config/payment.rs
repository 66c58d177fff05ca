//! Payment configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;

/// Payment configuration (Stripe)
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe API key
    pub stripe_api_key: String,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,

    /// Provider API root, overridable for local stubs
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// First backoff delay in milliseconds
    #[serde(default = "default_retry_initial_interval")]
    pub retry_initial_interval_ms: u64,

    /// Backoff delay cap in seconds
    #[serde(default = "default_retry_max_interval")]
    pub retry_max_interval_secs: u64,

    /// Total retry budget in seconds
    #[serde(default = "default_retry_max_elapsed")]
    pub retry_max_elapsed_secs: u64,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.starts_with("sk_live_")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_initial_interval(&self) -> Duration {
        Duration::from_millis(self.retry_initial_interval_ms)
    }

    pub fn retry_max_interval(&self) -> Duration {
        Duration::from_secs(self.retry_max_interval_secs)
    }

    pub fn retry_max_elapsed(&self) -> Duration {
        Duration::from_secs(self.retry_max_elapsed_secs)
    }

    /// Validate payment configuration
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        if self.stripe_api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if self.stripe_webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }

        // Verify key prefixes for safety
        if !self.stripe_api_key.starts_with("sk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !self.stripe_webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if *environment == Environment::Production && !self.is_live_mode() {
            return Err(ValidationError::LiveKeyRequired);
        }

        if !self.api_base_url.starts_with("https://") && !self.api_base_url.starts_with("http://") {
            return Err(ValidationError::InvalidApiBaseUrl);
        }
        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.retry_initial_interval_ms == 0 {
            return Err(ValidationError::InvalidRetrySchedule("initial interval is zero"));
        }
        if self.retry_max_interval() < self.retry_initial_interval() {
            return Err(ValidationError::InvalidRetrySchedule(
                "max interval is below initial interval",
            ));
        }
        if self.retry_max_elapsed() < self.retry_initial_interval() {
            return Err(ValidationError::InvalidRetrySchedule(
                "max elapsed is below initial interval",
            ));
        }

        Ok(())
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: String::new(),
            stripe_webhook_secret: String::new(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout(),
            retry_initial_interval_ms: default_retry_initial_interval(),
            retry_max_interval_secs: default_retry_max_interval(),
            retry_max_elapsed_secs: default_retry_max_elapsed(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_retry_initial_interval() -> u64 {
    500
}

fn default_retry_max_interval() -> u64 {
    15
}

fn default_retry_max_elapsed() -> u64 {
    60
}
