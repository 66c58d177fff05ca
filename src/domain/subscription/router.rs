//! Event router: turns a verified provider event into a reconciliation command.
//!
//! Provider objects are loosely typed and vary across API versions, so every
//! field is read through a defensive lookup. Unix times may arrive as
//! integers, decimals, or numeric strings.

use serde_json::Value;

use crate::domain::foundation::Timestamp;

use super::errors::WebhookError;
use super::provider_event::{ProviderEvent, ProviderEventKind};
use super::reconciliation::{ReconciliationCommand, RouteOutcome};
use super::SubscriptionStatus;

/// Classifies provider events and extracts reconciliation fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventRouter;

impl EventRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn route(&self, event: &ProviderEvent) -> Result<RouteOutcome, WebhookError> {
        let kind = event.kind();
        let object = &event.data.object;

        let desired = match &kind {
            ProviderEventKind::SubscriptionCreated | ProviderEventKind::SubscriptionUpdated => {
                let raw = string_at(object, &["status"])
                    .ok_or_else(|| WebhookError::malformed("subscription status missing"))?;
                SubscriptionStatus::from_provider(&raw).ok_or_else(|| {
                    WebhookError::malformed(format!("unknown subscription status '{}'", raw))
                })?
            }
            ProviderEventKind::SubscriptionDeleted => SubscriptionStatus::Canceled,
            ProviderEventKind::PaymentSucceeded => SubscriptionStatus::Active,
            ProviderEventKind::PaymentFailed => SubscriptionStatus::PastDue,
            ProviderEventKind::SubscriptionTrialEnding => {
                return Ok(RouteOutcome::no_op("trial ending notice"));
            }
            ProviderEventKind::CustomerCreated
            | ProviderEventKind::CustomerUpdated
            | ProviderEventKind::CustomerDeleted => {
                return Ok(RouteOutcome::no_op("customer events carry no subscription state"));
            }
            ProviderEventKind::Unknown(name) => {
                return Ok(RouteOutcome::no_op(format!("unhandled event type {}", name)));
            }
        };

        let Some(resource_id) = resource_id(event, &kind) else {
            return Ok(RouteOutcome::no_op("event carries no subscription reference"));
        };

        let cmd = match kind {
            ProviderEventKind::PaymentSucceeded => {
                let (start, end) = invoice_period(object);
                ReconciliationCommand::new(resource_id, desired)
                    .with_period(start, end)
                    .with_plan_id(invoice_plan_id(object))
            }
            ProviderEventKind::PaymentFailed => ReconciliationCommand::new(resource_id, desired),
            _ => {
                let mut cmd = ReconciliationCommand::new(resource_id, desired)
                    .with_period(
                        unix_time_at(object, &["current_period_start"]),
                        unix_time_at(object, &["current_period_end"]),
                    )
                    .with_plan_id(subscription_plan_id(object))
                    .with_trial(
                        unix_time_at(object, &["trial_start"]),
                        unix_time_at(object, &["trial_end"]),
                    )
                    .with_cancel_at_period_end(bool_at(object, &["cancel_at_period_end"]));

                // canceled_at is also set for cancellations scheduled at period
                // end, so it only counts once the subscription is really gone
                if desired.is_canceled() {
                    let at = unix_time_at(object, &["canceled_at"])
                        .or_else(|| unix_time_at(object, &["ended_at"]))
                        .or_else(|| Timestamp::from_unix_secs(event.created).filter(|_| event.created > 0));
                    cmd = cmd.with_canceled_at(at);
                }
                cmd
            }
        };

        Ok(RouteOutcome::Reconcile(cmd))
    }
}

/// Resolves which subscription an event refers to.
///
/// Invoices reference their subscription explicitly and their own `id` is an
/// invoice id; subscription objects are identified by their own `id`.
pub fn resource_id(event: &ProviderEvent, kind: &ProviderEventKind) -> Option<String> {
    let object = &event.data.object;
    match event.object_type() {
        Some("subscription") => string_at(object, &["id"]),
        Some("invoice") => reference_at(object, &["subscription"]).or_else(|| {
            reference_at(object, &["parent", "subscription_details", "subscription"])
        }),
        Some(_) => reference_at(object, &["subscription"]),
        None if kind.is_subscription_event() => {
            string_at(object, &["id"]).or_else(|| reference_at(object, &["subscription"]))
        }
        None => reference_at(object, &["subscription"]).or_else(|| string_at(object, &["id"])),
    }
}

fn subscription_plan_id(object: &Value) -> Option<String> {
    string_at(object, &["plan", "id"])
        .or_else(|| string_at(object, &["items", "data", "0", "price", "id"]))
}

fn invoice_plan_id(object: &Value) -> Option<String> {
    string_at(object, &["lines", "data", "0", "price", "id"])
        .or_else(|| string_at(object, &["lines", "data", "0", "plan", "id"]))
}

fn invoice_period(object: &Value) -> (Option<Timestamp>, Option<Timestamp>) {
    let start = unix_time_at(object, &["lines", "data", "0", "period", "start"])
        .or_else(|| unix_time_at(object, &["period_start"]));
    let end = unix_time_at(object, &["lines", "data", "0", "period", "end"])
        .or_else(|| unix_time_at(object, &["period_end"]));
    (start, end)
}

// ════════════════════════════════════════════════════════════════════════════════
// Defensive lookups
// ════════════════════════════════════════════════════════════════════════════════

/// Walks `path` through objects and arrays (numeric segments index arrays).
fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Non-empty string at `path`.
fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    lookup(value, path)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// An id reference: either a bare id string or an expanded object with `id`.
fn reference_at(value: &Value, path: &[&str]) -> Option<String> {
    let found = lookup(value, path)?;
    match found {
        Value::String(_) => string_at(found, &[]),
        Value::Object(_) => string_at(found, &["id"]),
        _ => None,
    }
}

fn bool_at(value: &Value, path: &[&str]) -> Option<bool> {
    lookup(value, path).and_then(Value::as_bool)
}

/// Unix seconds at `path`, coerced from integer, decimal, or numeric string.
/// Zero and negative values mean "unset".
fn unix_time_at(value: &Value, path: &[&str]) -> Option<Timestamp> {
    let secs = match lookup(value, path)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().and_then(|u| i64::try_from(u).ok()))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .or_else(|| s.trim().parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        _ => None,
    }?;
    if secs <= 0 {
        return None;
    }
    Timestamp::from_unix_secs(secs)
}
