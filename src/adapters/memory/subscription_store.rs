//! In-memory SubscriptionStore with the same version semantics as Postgres.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, SubscriptionId, UserId};
use crate::domain::subscription::Subscription;
use crate::ports::{SubscriptionStore, UpdateOutcome};

#[derive(Default)]
struct State {
    rows: HashMap<SubscriptionId, Subscription>,
    /// Updates that will lose to a simulated concurrent writer.
    pending_conflicts: u32,
    unavailable: bool,
    update_calls: u32,
}

#[derive(Default)]
pub struct InMemorySubscriptionStore {
    state: Mutex<State>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces a row as-is.
    pub fn seed(&self, subscription: Subscription) {
        self.state().rows.insert(subscription.id, subscription);
    }

    /// The next `count` updates find the version moved underneath them.
    pub fn inject_conflicts(&self, count: u32) {
        self.state().pending_conflicts = count;
    }

    /// Every operation fails with a database error while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    pub fn update_calls(&self) -> u32 {
        self.state().update_calls
    }

    pub fn get(&self, id: &SubscriptionId) -> Option<Subscription> {
        self.state().rows.get(id).cloned()
    }
}

fn check(state: &State) -> Result<(), DomainError> {
    if state.unavailable {
        return Err(DomainError::database("connection refused"));
    }
    Ok(())
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<Subscription>, DomainError> {
        let state = self.state();
        check(&state)?;
        Ok(state
            .rows
            .values()
            .find(|s| s.external_id == external_id)
            .cloned())
    }

    async fn find_by_id(&self, id: &SubscriptionId) -> Result<Option<Subscription>, DomainError> {
        let state = self.state();
        check(&state)?;
        Ok(state.rows.get(id).cloned())
    }

    async fn find_by_user_id(&self, user_id: &UserId) -> Result<Vec<Subscription>, DomainError> {
        let state = self.state();
        check(&state)?;
        let mut subs: Vec<Subscription> = state
            .rows
            .values()
            .filter(|s| &s.user_id == user_id)
            .cloned()
            .collect();
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subs)
    }

    async fn create(&self, subscription: &Subscription) -> Result<(), DomainError> {
        let mut state = self.state();
        check(&state)?;
        if state
            .rows
            .values()
            .any(|s| s.external_id == subscription.external_id)
        {
            return Err(DomainError::new(
                ErrorCode::VersionConflict,
                format!("Subscription {} already exists", subscription.external_id),
            ));
        }
        state.rows.insert(subscription.id, subscription.clone());
        Ok(())
    }

    async fn update(
        &self,
        subscription: &Subscription,
        expected_version: i64,
    ) -> Result<UpdateOutcome, DomainError> {
        let mut state = self.state();
        check(&state)?;
        state.update_calls += 1;

        if state.pending_conflicts > 0 {
            state.pending_conflicts -= 1;
            if let Some(row) = state.rows.get_mut(&subscription.id) {
                row.version += 1;
            }
        }

        let Some(row) = state.rows.get_mut(&subscription.id) else {
            return Ok(UpdateOutcome::NotFound);
        };
        if row.version != expected_version {
            return Ok(UpdateOutcome::VersionConflict);
        }

        let mut stored = subscription.clone();
        stored.version = expected_version + 1;
        *row = stored.clone();
        Ok(UpdateOutcome::Updated(stored))
    }
}
