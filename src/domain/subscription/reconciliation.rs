//! Normalized instructions produced by the event router.

use crate::domain::foundation::Timestamp;

use super::SubscriptionStatus;

/// What a provider event asks the local record to become.
///
/// Every optional field means "the provider did not say"; absent values
/// never clear stored ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationCommand {
    /// Provider subscription id (`Subscription::external_id`).
    pub resource_id: String,
    pub desired_status: SubscriptionStatus,
    pub period_start: Option<Timestamp>,
    pub period_end: Option<Timestamp>,
    pub canceled_at: Option<Timestamp>,
    pub plan_id: Option<String>,
    pub trial_start: Option<Timestamp>,
    pub trial_end: Option<Timestamp>,
    pub cancel_at_period_end: Option<bool>,
}

impl ReconciliationCommand {
    pub fn new(resource_id: impl Into<String>, desired_status: SubscriptionStatus) -> Self {
        Self {
            resource_id: resource_id.into(),
            desired_status,
            period_start: None,
            period_end: None,
            canceled_at: None,
            plan_id: None,
            trial_start: None,
            trial_end: None,
            cancel_at_period_end: None,
        }
    }

    /// Immediate cancellation at `at` (kept only if nothing was recorded before).
    pub fn cancel(resource_id: impl Into<String>, at: Timestamp) -> Self {
        Self::new(resource_id, SubscriptionStatus::Canceled).with_canceled_at(Some(at))
    }

    pub fn with_period(mut self, start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        self.period_start = start;
        self.period_end = end;
        self
    }

    pub fn with_canceled_at(mut self, at: Option<Timestamp>) -> Self {
        self.canceled_at = at;
        self
    }

    pub fn with_plan_id(mut self, plan_id: Option<String>) -> Self {
        self.plan_id = plan_id.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn with_trial(mut self, start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        self.trial_start = start;
        self.trial_end = end;
        self
    }

    pub fn with_cancel_at_period_end(mut self, flag: Option<bool>) -> Self {
        self.cancel_at_period_end = flag;
        self
    }

    /// True for explicit deletions and for any command carrying a cancellation time.
    pub fn is_forced_cancel(&self) -> bool {
        self.desired_status.is_canceled() || self.canceled_at.is_some()
    }
}

/// Result of routing one provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Reconcile(ReconciliationCommand),
    /// Acknowledge without touching any subscription.
    NoOp { reason: String },
}

impl RouteOutcome {
    pub fn no_op(reason: impl Into<String>) -> Self {
        RouteOutcome::NoOp {
            reason: reason.into(),
        }
    }
}
