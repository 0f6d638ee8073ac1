//! Semantic cache domain models, policies and tier traits
//!
//! Matches semantically similar requests by embedding similarity rather
//! than requiring exact key matches. Requests are partitioned by
//! `(company, role)` and entries only ever match the provider and model that
//! generated them.

mod config;
mod entry;
mod key;
mod quality;
mod search;
mod stats;
mod threshold;
mod tier;
mod vector_store;

pub use config::{AnnMode, CacheSettings, EvictionPolicy, MIN_CANDIDATE_K};
pub use entry::{expired_at, CacheEntry, EntryMetadata};
pub use key::{content_hash, hot_key, identity_key, Partition, HOT_PREFIX, IDENTITY_PREFIX};
pub use quality::quality_score;
pub use search::{CacheHit, LookupContext, SearchFilter, SearchResult, StoreOutcome, TierKind};
pub use stats::{BreakerSnapshot, CacheStats, CircuitState};
pub use threshold::{
    Complexity, Industry, Seniority, ThresholdContext, ThresholdPolicy, MAX_THRESHOLD,
    MIN_THRESHOLD,
};
pub use tier::{SimilaritySearchTier, TierQuery};
pub use vector_store::VectorStore;

#[cfg(test)]
pub use vector_store::MockVectorStore;
