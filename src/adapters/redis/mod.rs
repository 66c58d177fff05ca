//! Redis adapters.
//!
//! - `RedisCache` - `CacheStore` over a multiplexed connection
//! - `RedisStreamPublisher` - `EventPublisher` over Redis Streams

mod cache;
mod stream_publisher;

pub use cache::RedisCache;
pub use stream_publisher::RedisStreamPublisher;
