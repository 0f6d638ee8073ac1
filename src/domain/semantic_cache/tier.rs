//! Common interface over the similarity-search tiers

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use super::entry::CacheEntry;
use super::search::{SearchFilter, SearchResult, TierKind};
use super::stats::BreakerSnapshot;
use crate::domain::CacheError;

/// A similarity search request handed to each tier in turn
#[derive(Debug, Clone)]
pub struct TierQuery<'a> {
    /// Normalized query embedding
    pub embedding: &'a [f32],
    pub filter: &'a SearchFilter,
    /// Exact keys probed by key-addressed tiers
    pub keys: &'a [String],
    /// Candidate count for vector tiers
    pub k: usize,
}

/// One layer of the fallback chain
///
/// Results are ordered by descending similarity and already filtered by
/// provider/model (and partition, if set). Tiers without a content payload
/// return entries whose `content()` is `None`.
#[async_trait]
pub trait SimilaritySearchTier: Send + Sync + Debug {
    fn kind(&self) -> TierKind;

    async fn search(&self, query: &TierQuery<'_>) -> Result<Vec<SearchResult>, CacheError>;

    /// Insert or replace the entry under its identity key
    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Bump hit bookkeeping for an entry
    async fn record_hit(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    /// Drop entries older than `ttl`, returning how many were removed
    async fn remove_expired(&self, ttl: Duration) -> Result<usize, CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    async fn len(&self) -> Result<usize, CacheError>;

    /// Breaker guarding this tier, if any
    fn breaker(&self) -> Option<BreakerSnapshot> {
        None
    }
}
