//! In-memory vector store for development and testing

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::domain::embedding::cosine_similarity;
use crate::domain::semantic_cache::{
    CacheEntry, SearchFilter, SearchResult, TierKind, VectorStore,
};
use crate::domain::CacheError;

/// Exhaustive-scan vector store for development without PostgreSQL
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    dimensions: Option<usize>,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject embeddings whose length differs from `dimensions`
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<(), CacheError> {
        match self.dimensions {
            Some(dims) if dims != embedding.len() => Err(CacheError::validation(format!(
                "Embedding has {} dimensions, expected {}",
                embedding.len(),
                dims
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, entry: &CacheEntry) -> Result<String, CacheError> {
        self.check_dimensions(entry.embedding())?;

        let mut entries = self.entries.write().await;
        let stored = match entries.get(entry.key()) {
            Some(existing) => entry.without_content().with_hit_count(existing.hit_count()),
            None => entry.without_content(),
        };
        entries.insert(entry.key().to_string(), stored);

        Ok(entry.key().to_string())
    }

    async fn add_batch(&self, entries: &[CacheEntry]) -> Result<usize, CacheError> {
        for entry in entries {
            self.check_dimensions(entry.embedding())?;
        }

        let mut stored = self.entries.write().await;
        for entry in entries {
            stored.insert(entry.key().to_string(), entry.without_content());
        }

        Ok(entries.len())
    }

    async fn search(
        &self,
        embedding: &[f32],
        filter: &SearchFilter,
        k: usize,
    ) -> Result<Vec<SearchResult>, CacheError> {
        self.check_dimensions(embedding)?;

        let entries = self.entries.read().await;

        let mut results: Vec<SearchResult> = entries
            .values()
            .filter(|entry| filter.matches_entry(entry))
            .map(|entry| {
                let similarity = cosine_similarity(embedding, entry.embedding());
                SearchResult::new(entry.clone(), similarity, TierKind::PersistentVector)
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity()
                .partial_cmp(&a.similarity())
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entry().key().cmp(b.entry().key()))
        });
        results.truncate(k);

        Ok(results)
    }

    async fn delete_older_than(&self, max_age: Duration) -> Result<usize, CacheError> {
        let now = Utc::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();

        entries.retain(|_, entry| !entry.is_expired_at(max_age, now));

        Ok(before - entries.len())
    }

    async fn record_hit(&self, id: &str) -> Result<(), CacheError> {
        if let Some(entry) = self.entries.write().await.get_mut(id) {
            entry.record_hit(Utc::now());
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize, CacheError> {
        Ok(self.entries.read().await.len())
    }
}
