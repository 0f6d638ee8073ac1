//! Semantic Result Cache
//!
//! A multi-tier cache for expensive generated content, matched by embedding
//! similarity instead of exact keys:
//! - Memory tier with LRU/LFU/FIFO eviction
//! - In-process ANN index (flat or HNSW)
//! - Persistent vector store (pgvector or in-memory)
//! - Durable content store (Redis or moka)

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;
use std::time::Duration;

use domain::semantic_cache::VectorStore;
use domain::EmbeddingProvider;
use infrastructure::cache::{CacheConfig, CacheFactory};
use infrastructure::embedding::{HttpClient, OpenAiEmbeddingProvider};
use infrastructure::services::CacheOrchestrator;
use infrastructure::vector_store::{InMemoryVectorStore, PgvectorConfig, PgvectorStore};
use tracing::info;

const EMBEDDING_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the orchestrator and its backends from configuration
pub async fn create_cache(config: &AppConfig) -> anyhow::Result<CacheOrchestrator> {
    config.validate()?;

    let vector_store = create_vector_store(config).await?;

    let mut content_config = CacheConfig::from_url(config.backends.redis_url.as_deref());
    if !config.backends.redis_key_prefix.is_empty() {
        content_config = content_config.with_key_prefix(config.backends.redis_key_prefix.clone());
    }

    info!(backend = %content_config.cache_type, "Content store backend");
    let content_cache = CacheFactory::new().create(&content_config).await?;

    Ok(CacheOrchestrator::new(
        config.cache.clone(),
        vector_store,
        content_cache,
    )?)
}

async fn create_vector_store(config: &AppConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    let Some(url) = config.backends.postgres_url.as_deref() else {
        info!("Vector store backend: in-memory");
        return Ok(Arc::new(
            InMemoryVectorStore::new().with_dimensions(config.cache.dimensions),
        ));
    };

    let pg_config = PgvectorConfig::new(config.cache.dimensions)
        .with_table_name(config.backends.vector_table.clone())
        .with_max_connections(config.backends.postgres_max_connections);

    info!(table = %pg_config.table_name, "Vector store backend: pgvector");

    let store = PgvectorStore::connect(url, pg_config).await?;
    store.ensure_schema().await?;

    Ok(Arc::new(store))
}

/// OpenAI-compatible embedding adapter sized to the cache's dimensionality
pub fn create_embedding_provider(config: &AppConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let api_key = config
        .backends
        .embedding_api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .ok_or_else(|| {
            anyhow::anyhow!("backends.embedding_api_key or OPENAI_API_KEY is required")
        })?;

    let client = HttpClient::with_timeout(EMBEDDING_TIMEOUT)?;
    let dimensions = config.cache.dimensions;

    let mut provider = match config.backends.embedding_base_url.as_deref() {
        Some(base_url) => OpenAiEmbeddingProvider::with_base_url(client, api_key, base_url, dimensions),
        None => OpenAiEmbeddingProvider::new(client, api_key, dimensions),
    };

    if let Some(model) = &config.backends.embedding_model {
        provider = provider.with_model(model.clone());
    }

    info!(model = provider.model(), dimensions, "Embedding provider configured");

    Ok(Arc::new(provider))
}
