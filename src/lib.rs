//! Billing Reconciler - Subscription lifecycle reconciliation service
//!
//! Keeps the local view of billing subscriptions in step with an external
//! payment provider, driven by signed provider webhooks and by direct
//! create/cancel calls.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
