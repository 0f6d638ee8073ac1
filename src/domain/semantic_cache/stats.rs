//! Cache statistics and breaker snapshots

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::search::TierKind;

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    /// Name of the guarded dependency
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
}

/// Aggregate statistics for the orchestrator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_ratio: f64,
    pub hits_by_tier: HashMap<TierKind, u64>,
    pub total_cost_saved: f64,
    pub total_tokens_saved: u64,
    /// Mean raw similarity of hits
    pub average_similarity: f64,
    pub quality_rejections: u64,
    pub durable_write_failures: u64,
    pub memory_entries: usize,
    /// Live (non-tombstoned) ANN vectors
    pub ann_entries: usize,
    pub breakers: Vec<BreakerSnapshot>,
}

impl CacheStats {
    /// Average cost saved per hit
    pub fn average_cost_saved_per_hit(&self) -> f64 {
        if self.hits == 0 {
            0.0
        } else {
            self.total_cost_saved / self.hits as f64
        }
    }

    pub fn hits_for(&self, tier: TierKind) -> u64 {
        self.hits_by_tier.get(&tier).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_cost_saved_per_hit() {
        let stats = CacheStats {
            hits: 4,
            total_cost_saved: 0.2,
            ..Default::default()
        };

        assert!((stats.average_cost_saved_per_hit() - 0.05).abs() < 1e-9);
        assert_eq!(CacheStats::default().average_cost_saved_per_hit(), 0.0);
    }

    #[test]
    fn test_hits_for_missing_tier() {
        let stats = CacheStats::default();
        assert_eq!(stats.hits_for(TierKind::Memory), 0);
    }

    #[test]
    fn test_circuit_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
    }
}
