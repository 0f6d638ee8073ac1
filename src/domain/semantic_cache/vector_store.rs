//! Durable vector store abstraction

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use super::entry::CacheEntry;
use super::search::{SearchFilter, SearchResult};
use crate::domain::CacheError;

/// System of record for the embedding space
///
/// Similarities are returned on the cosine `[-1, 1]` scale regardless of what
/// the backing engine reports. Entries come back without content.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VectorStore: Send + Sync + Debug {
    /// Upsert one entry, returning its id
    async fn add(&self, entry: &CacheEntry) -> Result<String, CacheError>;

    /// Upsert many entries in one round trip
    async fn add_batch(&self, entries: &[CacheEntry]) -> Result<usize, CacheError>;

    /// Filtered nearest-neighbour search, best first
    async fn search(
        &self,
        embedding: &[f32],
        filter: &SearchFilter,
        k: usize,
    ) -> Result<Vec<SearchResult>, CacheError>;

    async fn delete_older_than(&self, max_age: Duration) -> Result<usize, CacheError>;

    async fn record_hit(&self, id: &str) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;

    async fn count(&self) -> Result<usize, CacheError>;
}
