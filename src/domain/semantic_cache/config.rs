//! Semantic cache configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::CacheError;

/// Eviction policy applied by the memory tier when it is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionPolicy {
    /// Evict the least recently accessed entry
    #[default]
    #[serde(alias = "LRU")]
    Lru,
    /// Evict the entry with the lowest access count
    #[serde(alias = "LFU")]
    Lfu,
    /// Evict the earliest inserted entry
    #[serde(alias = "FIFO")]
    Fifo,
}

impl std::fmt::Display for EvictionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lru => write!(f, "lru"),
            Self::Lfu => write!(f, "lfu"),
            Self::Fifo => write!(f, "fifo"),
        }
    }
}

/// Search mode of the ANN index tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnMode {
    /// Exhaustive cosine search
    Flat,
    /// Hierarchical navigable small-world graph
    #[default]
    Approximate,
}

/// Configuration for the multi-tier semantic cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Base similarity threshold before contextual adjustments
    #[serde(default = "default_similarity_base_threshold")]
    pub similarity_base_threshold: f64,

    /// Capacity of the memory tier
    #[serde(default = "default_max_memory_entries")]
    pub max_memory_entries: usize,

    #[serde(default)]
    pub eviction_policy: EvictionPolicy,

    /// Time-to-live for cached entries in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    #[serde(default)]
    pub ann_mode: AnnMode,

    #[serde(default = "default_breaker_failure_threshold")]
    pub breaker_failure_threshold: u32,

    #[serde(default = "default_breaker_recovery_timeout_secs")]
    pub breaker_recovery_timeout_secs: u64,

    #[serde(default = "default_breaker_half_open_max_calls")]
    pub breaker_half_open_max_calls: u32,

    /// Consecutive half-open successes needed to close a breaker
    #[serde(default = "default_breaker_success_threshold")]
    pub breaker_success_threshold: u32,

    /// Entries scoring below this quality are never written
    #[serde(default = "default_min_quality_score")]
    pub min_quality_score: f64,

    /// Embedding dimensionality shared by every entry
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Graph links kept per node
    #[serde(default = "default_ann_max_connections")]
    pub ann_max_connections: usize,

    #[serde(default = "default_ann_ef_construction")]
    pub ann_ef_construction: usize,

    /// Search breadth of the approximate index
    #[serde(default = "default_ann_ef_search")]
    pub ann_ef_search: usize,

    /// Candidates requested from the ANN tier before filtering
    #[serde(default = "default_ann_candidate_k")]
    pub ann_candidate_k: usize,

    #[serde(default = "default_persistent_search_k")]
    pub persistent_search_k: usize,

    #[serde(default = "default_company_match_bonus")]
    pub company_match_bonus: f64,

    #[serde(default = "default_role_match_bonus")]
    pub role_match_bonus: f64,

    /// Restrict vector searches to the request's partition
    #[serde(default)]
    pub partition_scoped_search: bool,

    #[serde(default = "default_true")]
    pub warming_enabled: bool,

    #[serde(default = "default_warming_batch_size")]
    pub warming_batch_size: usize,

    #[serde(default = "default_warming_batch_pause_ms")]
    pub warming_batch_pause_ms: u64,

    #[serde(default = "default_warming_max_companies")]
    pub warming_max_companies: usize,

    #[serde(default = "default_warming_max_roles")]
    pub warming_max_roles: usize,

    #[serde(default = "default_warming_templates_per_partition")]
    pub warming_templates_per_partition: usize,
}

fn default_similarity_base_threshold() -> f64 {
    0.85
}

fn default_max_memory_entries() -> usize {
    1000
}

fn default_ttl_secs() -> u64 {
    7 * 24 * 3600
}

fn default_breaker_failure_threshold() -> u32 {
    5
}

fn default_breaker_recovery_timeout_secs() -> u64 {
    60
}

fn default_breaker_half_open_max_calls() -> u32 {
    3
}

fn default_breaker_success_threshold() -> u32 {
    1
}

fn default_min_quality_score() -> f64 {
    0.7
}

fn default_dimensions() -> usize {
    384
}

fn default_ann_max_connections() -> usize {
    16
}

fn default_ann_ef_construction() -> usize {
    200
}

fn default_ann_ef_search() -> usize {
    64
}

fn default_ann_candidate_k() -> usize {
    10
}

fn default_persistent_search_k() -> usize {
    10
}

fn default_company_match_bonus() -> f64 {
    0.02
}

fn default_role_match_bonus() -> f64 {
    0.01
}

fn default_true() -> bool {
    true
}

fn default_warming_batch_size() -> usize {
    100
}

fn default_warming_batch_pause_ms() -> u64 {
    100
}

fn default_warming_max_companies() -> usize {
    20
}

fn default_warming_max_roles() -> usize {
    15
}

fn default_warming_templates_per_partition() -> usize {
    3
}

/// Smallest candidate count requested from vector tiers
pub const MIN_CANDIDATE_K: usize = 10;

/// Longest accepted entry lifetime (ten years)
pub const MAX_TTL_SECS: u64 = 10 * 365 * 86_400;

/// Upper bound for graph links per node
pub const MAX_ANN_CONNECTIONS: usize = 256;

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            similarity_base_threshold: default_similarity_base_threshold(),
            max_memory_entries: default_max_memory_entries(),
            eviction_policy: EvictionPolicy::default(),
            ttl_secs: default_ttl_secs(),
            ann_mode: AnnMode::default(),
            breaker_failure_threshold: default_breaker_failure_threshold(),
            breaker_recovery_timeout_secs: default_breaker_recovery_timeout_secs(),
            breaker_half_open_max_calls: default_breaker_half_open_max_calls(),
            breaker_success_threshold: default_breaker_success_threshold(),
            min_quality_score: default_min_quality_score(),
            dimensions: default_dimensions(),
            ann_max_connections: default_ann_max_connections(),
            ann_ef_construction: default_ann_ef_construction(),
            ann_ef_search: default_ann_ef_search(),
            ann_candidate_k: default_ann_candidate_k(),
            persistent_search_k: default_persistent_search_k(),
            company_match_bonus: default_company_match_bonus(),
            role_match_bonus: default_role_match_bonus(),
            partition_scoped_search: false,
            warming_enabled: default_true(),
            warming_batch_size: default_warming_batch_size(),
            warming_batch_pause_ms: default_warming_batch_pause_ms(),
            warming_max_companies: default_warming_max_companies(),
            warming_max_roles: default_warming_max_roles(),
            warming_templates_per_partition: default_warming_templates_per_partition(),
        }
    }
}

impl CacheSettings {
    /// Create settings with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get TTL as Duration
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn breaker_recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.breaker_recovery_timeout_secs)
    }

    pub fn warming_batch_pause(&self) -> Duration {
        Duration::from_millis(self.warming_batch_pause_ms)
    }

    /// Candidate count for ANN searches, never below [`MIN_CANDIDATE_K`]
    pub fn effective_candidate_k(&self) -> usize {
        self.ann_candidate_k.max(MIN_CANDIDATE_K)
    }

    /// Candidate count for persistent-store searches, never below [`MIN_CANDIDATE_K`]
    pub fn effective_persistent_k(&self) -> usize {
        self.persistent_search_k.max(MIN_CANDIDATE_K)
    }

    pub fn with_similarity_base_threshold(mut self, threshold: f64) -> Self {
        self.similarity_base_threshold = threshold;
        self
    }

    pub fn with_max_memory_entries(mut self, max: usize) -> Self {
        self.max_memory_entries = max;
        self
    }

    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_secs = ttl.as_secs();
        self
    }

    pub fn with_ann_mode(mut self, mode: AnnMode) -> Self {
        self.ann_mode = mode;
        self
    }

    pub fn with_breaker(mut self, failure_threshold: u32, recovery_timeout: Duration) -> Self {
        self.breaker_failure_threshold = failure_threshold;
        self.breaker_recovery_timeout_secs = recovery_timeout.as_secs();
        self
    }

    pub fn with_min_quality_score(mut self, score: f64) -> Self {
        self.min_quality_score = score;
        self
    }

    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }

    /// Set graph links per node, construction breadth and search breadth
    pub fn with_hnsw(mut self, max_connections: usize, ef_construction: usize, ef_search: usize) -> Self {
        self.ann_max_connections = max_connections;
        self.ann_ef_construction = ef_construction;
        self.ann_ef_search = ef_search;
        self
    }

    pub fn with_partition_scoped_search(mut self, scoped: bool) -> Self {
        self.partition_scoped_search = scoped;
        self
    }

    pub fn with_warming_enabled(mut self, enabled: bool) -> Self {
        self.warming_enabled = enabled;
        self
    }

    pub fn with_warming_batch(mut self, batch_size: usize, pause: Duration) -> Self {
        self.warming_batch_size = batch_size;
        self.warming_batch_pause_ms = pause.as_millis() as u64;
        self
    }

    /// Check value ranges; returns the first problem found
    pub fn validate(&self) -> Result<(), CacheError> {
        if !(0.5..=1.0).contains(&self.similarity_base_threshold) {
            return Err(CacheError::configuration(format!(
                "similarity_base_threshold must be within [0.5, 1.0], got {}",
                self.similarity_base_threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.min_quality_score) {
            return Err(CacheError::configuration(format!(
                "min_quality_score must be within [0.0, 1.0], got {}",
                self.min_quality_score
            )));
        }

        if self.max_memory_entries == 0 {
            return Err(CacheError::configuration(
                "max_memory_entries must be greater than zero",
            ));
        }

        if self.dimensions == 0 {
            return Err(CacheError::configuration("dimensions must be greater than zero"));
        }

        if self.ttl_secs == 0 || self.ttl_secs > MAX_TTL_SECS {
            return Err(CacheError::configuration(format!(
                "ttl_secs must be within [1, {}], got {}",
                MAX_TTL_SECS, self.ttl_secs
            )));
        }

        if self.breaker_failure_threshold == 0
            || self.breaker_half_open_max_calls == 0
            || self.breaker_success_threshold == 0
        {
            return Err(CacheError::configuration(
                "circuit breaker thresholds must be greater than zero",
            ));
        }

        if self.breaker_success_threshold > self.breaker_half_open_max_calls {
            return Err(CacheError::configuration(format!(
                "breaker_success_threshold ({}) cannot exceed breaker_half_open_max_calls ({})",
                self.breaker_success_threshold, self.breaker_half_open_max_calls
            )));
        }

        if !(2..=MAX_ANN_CONNECTIONS).contains(&self.ann_max_connections) {
            return Err(CacheError::configuration(format!(
                "ann_max_connections must be within [2, {}], got {}",
                MAX_ANN_CONNECTIONS, self.ann_max_connections
            )));
        }

        if self.ann_ef_construction == 0 || self.ann_ef_search == 0 {
            return Err(CacheError::configuration(
                "ann_ef_construction and ann_ef_search must be greater than zero",
            ));
        }

        if !(0.0..=0.1).contains(&self.company_match_bonus)
            || !(0.0..=0.1).contains(&self.role_match_bonus)
        {
            return Err(CacheError::configuration(
                "match bonuses must be within [0.0, 0.1]",
            ));
        }

        if self.warming_batch_size == 0 || self.warming_templates_per_partition == 0 {
            return Err(CacheError::configuration(
                "warming batch size and templates per partition must be greater than zero",
            ));
        }

        Ok(())
    }
}
