//! Scripted payment gateway for tests.
//!
//! Supports:
//! - Pre-configured subscription responses
//! - Error injection per method
//! - Call tracking with the idempotency key of every call

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::foundation::UserId;
use crate::ports::{CreateSubscriptionRequest, CreatedSubscription, PaymentError, PaymentGateway};

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    pub method: &'static str,
    /// Subscription external id, customer id or user id depending on the method.
    pub target: String,
    pub idempotency_key: Option<String>,
}

#[derive(Default)]
struct MockState {
    customers: HashMap<String, String>,
    next_subscription: Option<CreatedSubscription>,
    created_count: u32,
    /// Errors returned in order before calls start succeeding.
    errors: HashMap<&'static str, VecDeque<PaymentError>>,
    calls: Vec<GatewayCall>,
}

/// In-process `PaymentGateway` with scripted behavior.
#[derive(Default)]
pub struct MockPaymentGateway {
    inner: Mutex<MockState>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Set the response for the next `create_subscription` call.
    pub fn set_next_subscription(&self, subscription: CreatedSubscription) {
        self.state().next_subscription = Some(subscription);
    }

    /// Queue an error for `method` ("get_or_create_customer",
    /// "create_subscription" or "cancel_subscription").
    pub fn push_error(&self, method: &'static str, error: PaymentError) {
        self.state().errors.entry(method).or_default().push_back(error);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Assertions
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state().calls.iter().filter(|c| c.method == method).count()
    }

    fn record(
        &self,
        method: &'static str,
        target: impl Into<String>,
        idempotency_key: Option<&str>,
    ) -> Result<(), PaymentError> {
        let mut state = self.state();
        state.calls.push(GatewayCall {
            method,
            target: target.into(),
            idempotency_key: idempotency_key.map(str::to_string),
        });
        match state.errors.get_mut(method).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn get_or_create_customer(
        &self,
        user_id: &UserId,
        _email: &str,
    ) -> Result<String, PaymentError> {
        self.record("get_or_create_customer", user_id.as_str(), None)?;
        let mut state = self.state();
        let next = state.customers.len() + 1;
        Ok(state
            .customers
            .entry(user_id.to_string())
            .or_insert_with(|| format!("cus_mock_{}", next))
            .clone())
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<CreatedSubscription, PaymentError> {
        self.record(
            "create_subscription",
            request.customer_id.as_str(),
            Some(&request.idempotency_key),
        )?;
        let mut state = self.state();
        state.created_count += 1;
        let count = state.created_count;
        Ok(state.next_subscription.take().unwrap_or_else(|| CreatedSubscription {
            external_id: format!("sub_mock_{}", count),
            client_secret: Some(format!("pi_mock_{}_secret", count)),
            status: "incomplete".to_string(),
            current_period_start: None,
            current_period_end: None,
            trial_start: None,
            trial_end: None,
        }))
    }

    async fn cancel_subscription(
        &self,
        external_id: &str,
        idempotency_key: &str,
    ) -> Result<(), PaymentError> {
        self.record("cancel_subscription", external_id, Some(idempotency_key))
    }
}
