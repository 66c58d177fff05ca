//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - Durable subscription store and webhook event log
//! - `redis` - Cache backend and stream publisher
//! - `cache` - Read-through caching decorator over the subscription store
//! - `stripe` - Payment provider gateway with retry
//! - `events` - Bounded publish worker and in-memory bus
//! - `memory` - In-process stores for tests and local runs
//! - `metrics` - Prometheus registry and /metrics handler
//! - `http` - HTTP API

pub mod cache;
pub mod events;
pub mod http;
pub mod memory;
pub mod metrics;
pub mod postgres;
pub mod redis;
pub mod stripe;
