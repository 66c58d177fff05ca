//! Stripe API response shapes used by the gateway.
//!
//! Only the fields the gateway reads are modeled; everything else in the
//! provider's JSON is ignored.

use serde::Deserialize;

/// Error envelope returned with every non-2xx response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeErrorDetail,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StripeErrorDetail {
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub deleted: bool,
}

/// Result page of `/v1/customers/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSearchResult<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    pub trial_start: Option<i64>,
    pub trial_end: Option<i64>,
    /// Invoice id, or the expanded invoice object.
    pub latest_invoice: Option<serde_json::Value>,
}

impl StripeSubscription {
    /// Client secret of the first payment intent, when the invoice was expanded.
    pub fn client_secret(&self) -> Option<String> {
        self.latest_invoice
            .as_ref()?
            .pointer("/payment_intent/client_secret")?
            .as_str()
            .map(str::to_string)
    }
}
