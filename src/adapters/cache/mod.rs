//! Cache adapters.
//!
//! - `CachedSubscriptionStore` - best-effort cache decorator for `SubscriptionStore`
//! - `InMemoryCache` - TTL cache for tests and local runs

mod cached_store;
mod in_memory;

pub use cached_store::{external_key, subscription_key, user_key, CachedSubscriptionStore};
pub use in_memory::InMemoryCache;
