//! In-memory cache store with TTL, for tests and local runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::ports::{CacheError, CacheStore};

#[derive(Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (String, Instant)>>,
    unavailable: Mutex<bool>,
    failing_writes: Mutex<bool>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache whose every operation fails.
    pub fn unavailable() -> Self {
        let cache = Self::new();
        cache.set_unavailable(true);
        cache
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap_or_else(PoisonError::into_inner) = unavailable;
    }

    /// Makes `set` fail while reads and deletes keep working.
    pub fn set_failing_writes(&self, failing: bool) {
        *self.failing_writes.lock().unwrap_or_else(PoisonError::into_inner) = failing;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    /// Overwrites an entry directly, bypassing TTL handling.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries().insert(
            key.to_string(),
            (value.to_string(), Instant::now() + Duration::from_secs(3600)),
        );
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, (String, Instant)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), CacheError> {
        if *self.unavailable.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(CacheError::Unavailable("cache offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check_available()?;
        let mut entries = self.entries();
        match entries.get(key) {
            Some((_, expires)) if *expires <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.check_available()?;
        if *self.failing_writes.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(CacheError::Unavailable("cache rejected write".to_string()));
        }
        self.entries()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.check_available()?;
        self.entries().remove(key);
        Ok(())
    }
}
