//! Redis content cache

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, RedisError};

use crate::domain::cache::Cache;
use crate::domain::CacheError;

/// Configuration for Redis cache
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Keys examined per SCAN step
    pub scan_count: usize,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            key_prefix: None,
            scan_count: 100,
        }
    }
}

impl RedisCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_scan_count(mut self, count: usize) -> Self {
        self.scan_count = count.max(1);
        self
    }
}

/// Dropped connections and timeouts are transient; the rest is internal
fn map_redis_error(context: String, e: RedisError) -> CacheError {
    if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
    {
        CacheError::transient(format!("{}: {}", context, e))
    } else {
        CacheError::internal(format!("{}: {}", context, e))
    }
}

/// Redis-backed content store
///
/// Values are written with `SET EX` so Redis enforces the TTL. Pattern
/// deletion walks the keyspace with `SCAN MATCH` rather than `KEYS`.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    pub async fn new(config: RedisCacheConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            CacheError::configuration(format!("Failed to create Redis client: {}", e))
        })?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| map_redis_error("Failed to connect to Redis".to_string(), e))?;

        tracing::info!(prefix = ?config.key_prefix, "Connected to Redis content store");

        Ok(Self { connection, config })
    }

    pub async fn with_url(url: impl Into<String>) -> Result<Self, CacheError> {
        Self::new(RedisCacheConfig::new(url)).await
    }

    fn prefix_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let mut conn = self.connection.clone();
        let mut cursor = 0u64;
        let mut found = Vec::new();

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(self.config.scan_count)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    map_redis_error(format!("Failed to scan keys with pattern '{}'", pattern), e)
                })?;

            found.extend(keys);
            cursor = next;

            if cursor == 0 {
                break;
            }
        }

        Ok(found)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();

        conn.get(self.prefix_key(key))
            .await
            .map_err(|e| map_redis_error(format!("Failed to get key '{}'", key), e))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Err(CacheError::validation("TTL must be greater than zero"));
        }

        let mut conn = self.connection.clone();
        let ttl_secs = ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(self.prefix_key(key), value, ttl_secs)
            .await
            .map_err(|e| map_redis_error(format!("Failed to set key '{}'", key), e))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();

        let deleted: i64 = conn
            .del(self.prefix_key(key))
            .await
            .map_err(|e| map_redis_error(format!("Failed to delete key '{}'", key), e))?;

        Ok(deleted > 0)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let keys = self.scan(&self.prefix_key(pattern)).await?;
        let mut conn = self.connection.clone();
        let mut total_deleted = 0usize;

        for chunk in keys.chunks(self.config.scan_count) {
            let deleted: i64 = conn
                .del(chunk)
                .await
                .map_err(|e| map_redis_error("Failed to delete keys".to_string(), e))?;
            total_deleted += deleted.max(0) as usize;
        }

        tracing::debug!(pattern, deleted = total_deleted, "Deleted keys by pattern");

        Ok(total_deleted)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();

        conn.exists(self.prefix_key(key)).await.map_err(|e| {
            map_redis_error(format!("Failed to check existence of key '{}'", key), e)
        })
    }

    async fn clear(&self) -> Result<(), CacheError> {
        match &self.config.key_prefix {
            Some(_) => {
                self.delete_pattern("*").await?;
            }
            None => {
                let mut conn = self.connection.clone();
                redis::cmd("FLUSHDB")
                    .query_async::<()>(&mut conn)
                    .await
                    .map_err(|e| map_redis_error("Failed to flush database".to_string(), e))?;
            }
        }

        Ok(())
    }

    async fn size(&self) -> Result<usize, CacheError> {
        match &self.config.key_prefix {
            Some(_) => Ok(self.scan(&self.prefix_key("*")).await?.len()),
            None => {
                let mut conn = self.connection.clone();
                redis::cmd("DBSIZE")
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| map_redis_error("Failed to get database size".to_string(), e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_test_config() -> RedisCacheConfig {
        RedisCacheConfig::new("redis://127.0.0.1:6379").with_key_prefix("semcache_test")
    }

    #[test]
    fn test_config_builder() {
        let config = RedisCacheConfig::new("redis://cache:6379")
            .with_key_prefix("app")
            .with_scan_count(0);

        assert_eq!(config.url, "redis://cache:6379");
        assert_eq!(config.key_prefix.as_deref(), Some("app"));
        assert_eq!(config.scan_count, 1);
    }

    #[test]
    fn test_error_classification() {
        let io: RedisError =
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset").into();
        assert!(matches!(
            map_redis_error("get".to_string(), io),
            CacheError::TransientIo { .. }
        ));

        let parse: RedisError = (redis::ErrorKind::TypeError, "bad type").into();
        assert!(matches!(
            map_redis_error("get".to_string(), parse),
            CacheError::Internal { .. }
        ));
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_set_get_delete() {
        let cache = RedisCache::new(get_test_config()).await.unwrap();

        cache
            .set_raw("key1", "value1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(cache.get_raw("key1").await.unwrap(), Some("value1".to_string()));

        assert!(cache.delete("key1").await.unwrap());
        assert!(cache.get_raw("key1").await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_delete_pattern() {
        let cache = RedisCache::new(get_test_config()).await.unwrap();
        let ttl = Duration::from_secs(60);

        cache.set_raw("semantic_cache:a:1", "x", ttl).await.unwrap();
        cache.set_raw("semantic_cache:a:2", "y", ttl).await.unwrap();
        cache.set_raw("other", "z", ttl).await.unwrap();

        assert_eq!(cache.delete_pattern("semantic_cache:*").await.unwrap(), 2);
        assert!(cache.exists("other").await.unwrap());

        cache.clear().await.unwrap();
        assert_eq!(cache.size().await.unwrap(), 0);
    }
}
