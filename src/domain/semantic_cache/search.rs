//! Search results, filters and lookup outcomes

use std::fmt;

use serde::{Deserialize, Serialize};

use super::entry::CacheEntry;
use super::key::Partition;
use super::threshold::ThresholdContext;

/// The tier a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierKind {
    Memory,
    AnnIndex,
    PersistentVector,
}

impl TierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::AnnIndex => "ann_index",
            Self::PersistentVector => "persistent_vector",
        }
    }

    /// In-process tiers must succeed for a write to count
    pub fn is_in_process(&self) -> bool {
        matches!(self, Self::Memory | Self::AnnIndex)
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate entry with its cosine similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    entry: CacheEntry,
    similarity: f32,
    tier: TierKind,
}

impl SearchResult {
    pub fn new(entry: CacheEntry, similarity: f32, tier: TierKind) -> Self {
        Self {
            entry,
            similarity: similarity.clamp(-1.0, 1.0),
            tier,
        }
    }

    pub fn entry(&self) -> &CacheEntry {
        &self.entry
    }

    pub fn entry_mut(&mut self) -> &mut CacheEntry {
        &mut self.entry
    }

    pub fn into_entry(self) -> CacheEntry {
        self.entry
    }

    pub fn similarity(&self) -> f32 {
        self.similarity
    }

    pub fn tier(&self) -> TierKind {
        self.tier
    }

    /// Same result attributed to another tier
    pub fn with_tier(mut self, tier: TierKind) -> Self {
        self.tier = tier;
        self
    }
}

/// Equality predicates applied to vector search candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    pub provider: String,
    pub model: String,
    pub partition: Option<Partition>,
}

impl SearchFilter {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            partition: None,
        }
    }

    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn matches(&self, provider: &str, model: &str, partition: &Partition) -> bool {
        self.provider == provider
            && self.model == model
            && self.partition.as_ref().is_none_or(|p| p == partition)
    }

    pub fn matches_entry(&self, entry: &CacheEntry) -> bool {
        self.matches(entry.provider(), entry.model(), entry.partition())
    }
}

/// Per-request context supplied with a lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LookupContext {
    pub company: String,
    pub role: String,
    pub threshold: ThresholdContext,
}

impl LookupContext {
    pub fn new(company: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            company: company.into(),
            role: role.into(),
            threshold: ThresholdContext::default(),
        }
    }

    pub fn with_threshold_context(mut self, threshold: ThresholdContext) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn partition(&self) -> Partition {
        Partition::new(&self.company, &self.role)
    }
}

/// A resolved cache hit returned to callers
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub content: String,
    /// Raw cosine similarity, without preference bonuses
    pub similarity: f32,
    pub tier: TierKind,
    pub key: String,
}

/// Result of a `store` call
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    /// Written under the given identity key
    Stored { key: String },
    /// Discarded for scoring below the minimum quality
    QualityRejected { score: f64 },
}

impl StoreOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored { .. })
    }
}
