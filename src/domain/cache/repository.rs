//! Cache trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::CacheError;

/// Key-value cache with TTL support, used to hold full content payloads
/// outside the vector indexes
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Gets a raw value from the cache
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Sets a raw value in the cache with a TTL
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Deletes a value from the cache
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Deletes every key matching a `*` pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError>;

    /// Checks if a key exists in the cache
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    /// Clears all entries from the cache
    async fn clear(&self) -> Result<(), CacheError>;

    /// Returns approximate number of entries in the cache
    async fn size(&self) -> Result<usize, CacheError>;
}
