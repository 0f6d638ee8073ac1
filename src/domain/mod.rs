//! Domain layer - Cache entities, policies and collaborator traits

pub mod cache;
pub mod embedding;
pub mod error;
pub mod semantic_cache;

pub use cache::Cache;
pub use embedding::{cosine_similarity, normalize, EmbeddingProvider};
pub use error::CacheError;
pub use semantic_cache::{
    CacheEntry, CacheHit, CacheSettings, CacheStats, EntryMetadata, LookupContext, Partition,
    SearchFilter, SearchResult, StoreOutcome, ThresholdContext, TierKind,
};
