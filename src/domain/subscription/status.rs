//! Subscription status state machine.
//!
//! ```text
//! pending ──► trialing ──► active ◄──► past_due
//!    │            │          ▲ │
//!    │            └─► paused ◄─┘
//!    └──────────────► (any) ──► canceled
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Local lifecycle status of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Created locally, provider has not confirmed the first payment.
    Pending,
    Trialing,
    Active,
    /// Latest invoice failed; provider is retrying collection.
    PastDue,
    Paused,
    /// Terminal.
    Canceled,
}

impl SubscriptionStatus {
    /// Maps a provider status string onto the local state machine.
    ///
    /// Returns `None` for strings the provider has not documented.
    pub fn from_provider(status: &str) -> Option<Self> {
        match status {
            "incomplete" => Some(Self::Pending),
            "trialing" => Some(Self::Trialing),
            "active" => Some(Self::Active),
            "past_due" | "unpaid" => Some(Self::PastDue),
            "paused" => Some(Self::Paused),
            "canceled" | "incomplete_expired" => Some(Self::Canceled),
            _ => None,
        }
    }

    /// Storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Trialing => "trialing",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Paused => "paused",
            Self::Canceled => "canceled",
        }
    }

    /// Parses the storage representation produced by [`as_str`](Self::as_str).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "trialing" => Some(Self::Trialing),
            "active" => Some(Self::Active),
            "past_due" => Some(Self::PastDue),
            "paused" => Some(Self::Paused),
            "canceled" => Some(Self::Canceled),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Trialing, Active, PastDue, Canceled],
            Trialing => vec![Active, PastDue, Paused, Canceled],
            Active => vec![PastDue, Paused, Canceled],
            PastDue => vec![Active, Canceled],
            Paused => vec![Active, Canceled],
            Canceled => vec![],
        }
    }
}
