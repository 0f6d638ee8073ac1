//! Similarity-search tiers behind the cache orchestrator

mod ann;
mod content;
mod memory;
mod persistent;

pub use ann::{AnnIndexConfig, AnnIndexTier, AnnMetadata};
pub use content::DurableContentStore;
pub use memory::MemoryTier;
pub use persistent::PersistentVectorTier;
