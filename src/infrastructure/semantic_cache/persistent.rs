//! Breaker-guarded adapter exposing a vector store as a search tier

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::semantic_cache::{
    BreakerSnapshot, CacheEntry, SearchResult, SimilaritySearchTier, TierKind, TierQuery,
    VectorStore,
};
use crate::domain::CacheError;
use crate::infrastructure::resilience::CircuitBreaker;

/// The durable last-resort similarity tier
#[derive(Debug)]
pub struct PersistentVectorTier {
    store: Arc<dyn VectorStore>,
    breaker: Arc<CircuitBreaker>,
}

impl PersistentVectorTier {
    pub fn new(store: Arc<dyn VectorStore>, breaker: Arc<CircuitBreaker>) -> Self {
        Self { store, breaker }
    }

    /// Bulk upsert through the breaker, used by warming
    pub async fn insert_batch(&self, entries: &[CacheEntry]) -> Result<usize, CacheError> {
        self.breaker.call(|| self.store.add_batch(entries)).await
    }
}

#[async_trait]
impl SimilaritySearchTier for PersistentVectorTier {
    fn kind(&self) -> TierKind {
        TierKind::PersistentVector
    }

    async fn search(&self, query: &TierQuery<'_>) -> Result<Vec<SearchResult>, CacheError> {
        let results = self
            .breaker
            .call(|| self.store.search(query.embedding, query.filter, query.k))
            .await?;

        Ok(results
            .into_iter()
            .map(|r| r.with_tier(TierKind::PersistentVector))
            .collect())
    }

    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.breaker.call(|| self.store.add(entry)).await.map(|_| ())
    }

    async fn record_hit(&self, key: &str) -> Result<(), CacheError> {
        self.breaker.call(|| self.store.record_hit(key)).await
    }

    async fn remove_expired(&self, ttl: Duration) -> Result<usize, CacheError> {
        self.breaker.call(|| self.store.delete_older_than(ttl)).await
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.breaker.call(|| self.store.clear()).await
    }

    async fn len(&self) -> Result<usize, CacheError> {
        self.breaker.call(|| self.store.count()).await
    }

    fn breaker(&self) -> Option<BreakerSnapshot> {
        Some(self.breaker.snapshot())
    }
}
