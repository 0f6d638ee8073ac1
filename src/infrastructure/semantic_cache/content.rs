//! Durable key → content store kept apart from the vector indexes

use std::sync::Arc;
use std::time::Duration;

use crate::domain::cache::Cache;
use crate::domain::semantic_cache::{BreakerSnapshot, IDENTITY_PREFIX};
use crate::domain::CacheError;
use crate::infrastructure::resilience::CircuitBreaker;

/// Full-content payloads keyed by entry identity
///
/// Every call goes through the store's own breaker. Only identity keys are
/// accepted so `delete_all` can clear the namespace without touching
/// unrelated keys that share the backend.
#[derive(Debug)]
pub struct DurableContentStore {
    cache: Arc<dyn Cache>,
    breaker: Arc<CircuitBreaker>,
}

impl DurableContentStore {
    pub fn new(cache: Arc<dyn Cache>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { cache, breaker }
    }

    fn check_key(key: &str) -> Result<(), CacheError> {
        if key.len() <= IDENTITY_PREFIX.len() || !key.starts_with(IDENTITY_PREFIX) {
            return Err(CacheError::validation(format!("Malformed content key: '{}'", key)));
        }
        Ok(())
    }

    pub async fn put(&self, key: &str, content: &str, ttl: Duration) -> Result<(), CacheError> {
        Self::check_key(key)?;
        self.breaker
            .call(|| self.cache.set_raw(key, content, ttl))
            .await
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Self::check_key(key)?;
        self.breaker.call(|| self.cache.get_raw(key)).await
    }

    /// Remove every cached payload, returning how many were deleted
    pub async fn delete_all(&self) -> Result<usize, CacheError> {
        let pattern = format!("{}*", IDENTITY_PREFIX);
        let deleted = self
            .breaker
            .call(|| self.cache.delete_pattern(&pattern))
            .await?;

        tracing::info!(deleted, "Cleared durable content store");
        Ok(deleted)
    }

    pub fn breaker(&self) -> BreakerSnapshot {
        self.breaker.snapshot()
    }
}
