//! Webhook signature verification.
//!
//! Header format: `t=<unix>,v1=<hex hmac>[,v0=<legacy>]`. The signed payload
//! is `"{t}.{body}"` keyed with the shared endpoint secret (HMAC-SHA256).
//! Verification runs before any parsing of the body.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Largest accepted webhook body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Maximum age for webhook events (5 minutes).
const MAX_TIMESTAMP_AGE_SECS: i64 = 300;

/// Clock skew tolerance for future timestamps.
const MAX_FUTURE_TOLERANCE_SECS: i64 = 60;

/// Parsed signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Parses the header; unknown keys are ignored, several `v1` entries are
    /// allowed (secret rotation).
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::signature("malformed header"))?;

            match key {
                "t" => {
                    timestamp = Some(
                        value
                            .parse::<i64>()
                            .map_err(|_| WebhookError::signature("invalid timestamp"))?,
                    );
                }
                "v1" => {
                    let bytes = hex::decode(value.trim())
                        .map_err(|_| WebhookError::signature("invalid v1 signature hex"))?;
                    v1_signatures.push(bytes);
                }
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| WebhookError::signature("missing timestamp"))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::signature("missing v1 signature"));
        }

        Ok(Self {
            timestamp,
            v1_signatures,
        })
    }
}

/// Verifies inbound webhook authenticity against a shared secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: SecretString,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verifies `body` against `header` using the current wall clock.
    pub fn verify(&self, body: &[u8], header: Option<&str>) -> Result<(), WebhookError> {
        self.verify_at(body, header, chrono::Utc::now().timestamp())
    }

    /// Verifies `body` against `header` as if the current time were `now`.
    pub fn verify_at(
        &self,
        body: &[u8],
        header: Option<&str>,
        now: i64,
    ) -> Result<(), WebhookError> {
        if body.len() > MAX_BODY_BYTES {
            return Err(WebhookError::BodyTooLarge {
                size: body.len(),
                limit: MAX_BODY_BYTES,
            });
        }

        let header = header.ok_or_else(|| WebhookError::signature("missing signature header"))?;
        let header = SignatureHeader::parse(header)?;

        let age = now.saturating_sub(header.timestamp);
        if age > MAX_TIMESTAMP_AGE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                age_secs = age,
                "Webhook signature too old - possible replay"
            );
            return Err(WebhookError::signature("timestamp outside tolerance"));
        }
        if age < -MAX_FUTURE_TOLERANCE_SECS {
            tracing::warn!(
                event_timestamp = header.timestamp,
                current_time = now,
                "Webhook signature from the future"
            );
            return Err(WebhookError::signature("timestamp in the future"));
        }

        let expected = compute_mac(self.secret.expose_secret().as_bytes(), header.timestamp, body)?;
        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| expected.as_slice().ct_eq(candidate.as_slice()).unwrap_u8() == 1);

        if !matched {
            tracing::warn!("Webhook signature mismatch");
            return Err(WebhookError::signature("signature mismatch"));
        }
        Ok(())
    }
}

fn compute_mac(secret: &[u8], timestamp: i64, body: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| WebhookError::signature("unusable signing secret"))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Builds a valid signature header for `body`, the way the provider does.
///
/// Used by tests and by local tooling that replays stored webhooks.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> String {
    let mac = compute_mac(secret.as_bytes(), timestamp, body).unwrap_or_default();
    format!("t={},v1={}", timestamp, hex::encode(mac))
}
