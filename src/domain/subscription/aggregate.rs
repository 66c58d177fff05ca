//! Subscription aggregate.
//!
//! A subscription mirrors one provider-side subscription. It is only ever
//! mutated through [`Subscription::reconcile`], which merges a normalized
//! provider instruction into the stored state.
//!
//! # Invariants
//!
//! - `status == Canceled` if and only if `canceled_at` is set
//! - `status == Trialing` implies `trial_end` is set and equals `current_period_end`
//! - `current_period_end` never moves backwards
//! - once canceled, nothing changes again
//! - `updated_at` only moves when a field actually changed

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{StateMachine, SubscriptionId, Timestamp, UserId};

use super::{ReconciliationCommand, SubscriptionStatus};

/// Local record of a provider subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,

    /// Provider subscription id; natural key for webhooks.
    pub external_id: String,

    pub user_id: UserId,

    /// Provider plan/price reference.
    pub plan_id: String,

    /// Provider customer id.
    pub customer_id: Option<String>,

    pub status: SubscriptionStatus,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub trial_start: Option<Timestamp>,
    pub trial_end: Option<Timestamp>,

    /// Scheduled cancellation, distinct from immediate cancellation.
    pub cancel_at_period_end: bool,

    /// Set once, first write wins.
    pub canceled_at: Option<Timestamp>,

    pub created_at: Timestamp,
    pub updated_at: Timestamp,

    /// Optimistic concurrency counter, bumped by the store on every update.
    pub version: i64,
}

/// What a call to [`Subscription::reconcile`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub changed: bool,
    pub previous_status: SubscriptionStatus,
    /// Status the command asked for but the state machine refused.
    pub rejected_status: Option<SubscriptionStatus>,
}

impl MergeOutcome {
    fn unchanged(status: SubscriptionStatus) -> Self {
        Self {
            changed: false,
            previous_status: status,
            rejected_status: None,
        }
    }
}

impl Subscription {
    /// Creates the local record right after the provider accepted a new subscription.
    ///
    /// The record starts as `Pending`; the provider's immediate status is
    /// applied afterwards through [`reconcile`](Self::reconcile).
    pub fn new_pending(
        user_id: UserId,
        external_id: impl Into<String>,
        plan_id: impl Into<String>,
        customer_id: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            external_id: external_id.into(),
            user_id,
            plan_id: plan_id.into(),
            customer_id,
            status: SubscriptionStatus::Pending,
            current_period_start: None,
            current_period_end: None,
            trial_start: None,
            trial_end: None,
            cancel_at_period_end: false,
            canceled_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    pub fn is_owned_by(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    /// Merges a provider instruction into this record.
    ///
    /// Applying the same command twice leaves the record unchanged the second
    /// time, so redelivered webhooks are harmless.
    pub fn reconcile(&mut self, cmd: &ReconciliationCommand, now: Timestamp) -> MergeOutcome {
        if self.status.is_canceled() {
            return MergeOutcome::unchanged(self.status);
        }

        let mut outcome = MergeOutcome::unchanged(self.status);
        let mut changed = self.merge_plan(cmd.plan_id.as_deref());
        changed |= self.merge_cancel_at_period_end(cmd.cancel_at_period_end);

        if cmd.is_forced_cancel() {
            changed |= self.merge_period(cmd.period_start, cmd.period_end);
            self.canceled_at.get_or_insert(cmd.canceled_at.unwrap_or(now));
            self.status = SubscriptionStatus::Canceled;
            changed = true;
        } else if cmd.desired_status == SubscriptionStatus::Trialing {
            match self.merge_trial(cmd) {
                Ok(trial_changed) => changed |= trial_changed,
                Err(()) => outcome.rejected_status = Some(SubscriptionStatus::Trialing),
            }
        } else {
            match self.merge_status(cmd.desired_status) {
                Ok(status_changed) => changed |= status_changed,
                Err(()) => outcome.rejected_status = Some(cmd.desired_status),
            }
            // a trial's period is pinned to trial_end until the trial is left
            if self.status != SubscriptionStatus::Trialing {
                changed |= self.merge_period(cmd.period_start, cmd.period_end);
            }
        }

        if changed {
            self.updated_at = now;
        }
        outcome.changed = changed;
        outcome
    }

    fn merge_plan(&mut self, plan_id: Option<&str>) -> bool {
        match plan_id {
            Some(plan) if !plan.is_empty() && plan != self.plan_id => {
                self.plan_id = plan.to_string();
                true
            }
            _ => false,
        }
    }

    fn merge_cancel_at_period_end(&mut self, flag: Option<bool>) -> bool {
        match flag {
            Some(flag) if flag != self.cancel_at_period_end => {
                self.cancel_at_period_end = flag;
                true
            }
            _ => false,
        }
    }

    /// Moves the billing period forward; later-arriving stale periods are ignored.
    fn merge_period(&mut self, start: Option<Timestamp>, end: Option<Timestamp>) -> bool {
        let Some(end) = end else {
            return false;
        };
        if let Some(current) = self.current_period_end {
            if !end.is_after(&current) {
                return false;
            }
        }
        self.current_period_end = Some(end);
        if let Some(start) = start {
            self.current_period_start = Some(start);
        }
        true
    }

    fn merge_status(&mut self, desired: SubscriptionStatus) -> Result<bool, ()> {
        if desired == self.status {
            return Ok(false);
        }
        let next = self.status.transition_to(desired).map_err(|_| ())?;
        self.status = next;
        Ok(true)
    }

    fn merge_trial(&mut self, cmd: &ReconciliationCommand) -> Result<bool, ()> {
        let already_trialing = self.status == SubscriptionStatus::Trialing;
        if !already_trialing && !self.status.can_transition_to(&SubscriptionStatus::Trialing) {
            return Err(());
        }

        let carried = if already_trialing { self.trial_end } else { None };
        let trial_end = cmd.trial_end.or(cmd.period_end).or(carried).ok_or(())?;

        if let Some(current) = self.current_period_end {
            if trial_end.is_before(&current) {
                // stale trial window; keep what we have
                return Ok(false);
            }
        }

        let mut changed = false;
        if !already_trialing {
            self.status = SubscriptionStatus::Trialing;
            changed = true;
        }
        if self.trial_end != Some(trial_end) {
            self.trial_end = Some(trial_end);
            changed = true;
        }
        if self.current_period_end != Some(trial_end) {
            self.current_period_end = Some(trial_end);
            changed = true;
        }
        if let Some(start) = cmd.trial_start {
            if self.trial_start != Some(start) {
                self.trial_start = Some(start);
                changed = true;
            }
        }
        if let Some(start) = cmd.trial_start.or(cmd.period_start) {
            if self.current_period_start != Some(start) {
                self.current_period_start = Some(start);
                changed = true;
            }
        }
        Ok(changed)
    }
}
