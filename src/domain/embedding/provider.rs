//! Embedding provider trait definition

use async_trait::async_trait;
use std::fmt::Debug;

use crate::domain::CacheError;

/// Trait for embedding providers (OpenAI-compatible APIs, local models, ...)
///
/// Implementations return vectors of `dimensions()` length. Callers are
/// expected to normalize before handing vectors to the cache.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>, CacheError>;

    /// Generate embeddings for several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, CacheError> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            embeddings.push(self.embed(text).await?);
        }

        Ok(embeddings)
    }

    /// Get the provider name
    fn provider_name(&self) -> &'static str;

    /// Get the embedding dimensions
    fn dimensions(&self) -> usize;
}
