//! Stripe payment gateway adapter.
//!
//! Implements the `PaymentGateway` port for Stripe, including:
//! - Customer lookup by `metadata['user_id']` and creation
//! - Subscription creation with `default_incomplete` payment behavior
//! - Immediate cancellation
//! - Exponential backoff on rate limits, transport errors and 5xx
//!
//! # Security
//!
//! - The API key is held as `secrecy::SecretString` and redacted in `Debug`

mod gateway;
mod mock_gateway;
mod retry;
mod wire_types;

pub use gateway::{StripeConfig, StripeGateway};
pub use mock_gateway::{GatewayCall, MockPaymentGateway};
pub use retry::RetryPolicy;
