//! In-process approximate-nearest-neighbour tier
//!
//! Holds normalized embeddings plus compact metadata, never content. Flat
//! mode scans every live vector; approximate mode walks an HNSW graph whose
//! search breadth (`ef_search`) is the recall/latency knob. Vectors are never
//! updated in place: a re-insert retires the old id and `rebuild()` drops
//! retired ids from the graph.

mod graph;

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use self::graph::CosineGraph;
use crate::domain::embedding::{cosine_similarity, l2_norm};
use crate::domain::semantic_cache::{
    expired_at, AnnMode, CacheEntry, CacheSettings, EntryMetadata, Partition, SearchFilter,
    SearchResult, SimilaritySearchTier, TierKind, TierQuery,
};
use crate::domain::CacheError;

/// Fixed-shape metadata kept per indexed vector
#[derive(Debug, Clone, PartialEq)]
pub struct AnnMetadata {
    pub key: String,
    pub company: String,
    pub role: String,
    pub provider: String,
    pub model: String,
    pub quality_score: f64,
    pub created_at: DateTime<Utc>,
    pub token_count: u32,
    pub cost: f64,
}

impl AnnMetadata {
    pub fn from_entry(entry: &CacheEntry) -> Self {
        let meta = entry.metadata();

        Self {
            key: entry.key().to_string(),
            company: meta.company.clone(),
            role: meta.role.clone(),
            provider: meta.provider.clone(),
            model: meta.model.clone(),
            quality_score: entry.quality_score(),
            created_at: entry.created_at(),
            token_count: meta.token_count,
            cost: meta.cost,
        }
    }

    fn to_entry(&self, embedding: &[f32]) -> CacheEntry {
        let metadata = EntryMetadata {
            company: self.company.clone(),
            role: self.role.clone(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            token_count: self.token_count,
            cost: self.cost,
            ..Default::default()
        };

        CacheEntry::restored(
            self.key.clone(),
            embedding.to_vec(),
            metadata,
            self.quality_score,
            self.created_at,
        )
    }
}

/// Index configuration
#[derive(Debug, Clone)]
pub struct AnnIndexConfig {
    pub mode: AnnMode,
    pub dimensions: usize,
    pub max_connections: usize,
    pub ef_construction: usize,
    pub ef_search: usize,
}

impl AnnIndexConfig {
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self {
            mode: settings.ann_mode,
            dimensions: settings.dimensions,
            max_connections: settings.ann_max_connections,
            ef_construction: settings.ann_ef_construction,
            ef_search: settings.ann_ef_search,
        }
    }

    fn graph(&self) -> Option<CosineGraph> {
        match self.mode {
            AnnMode::Approximate => Some(CosineGraph::new(
                self.max_connections,
                self.ef_construction,
            )),
            AnnMode::Flat => None,
        }
    }
}

#[derive(Debug)]
struct StoredVector {
    embedding: Vec<f32>,
    meta: AnnMetadata,
}

#[derive(Debug, Default)]
struct AnnState {
    next_id: usize,
    vectors: HashMap<usize, StoredVector>,
    by_key: HashMap<String, usize>,
    tombstones: HashSet<usize>,
    graph: Option<CosineGraph>,
}

impl AnnState {
    fn live_len(&self) -> usize {
        self.vectors.len().saturating_sub(self.tombstones.len())
    }

    fn is_live(&self, id: usize) -> bool {
        self.vectors.contains_key(&id) && !self.tombstones.contains(&id)
    }

    fn tombstone_key(&mut self, key: &str) -> bool {
        match self.by_key.remove(key) {
            Some(id) => self.tombstones.insert(id),
            None => false,
        }
    }
}

/// Similarity index tier
#[derive(Debug)]
pub struct AnnIndexTier {
    config: AnnIndexConfig,
    ef_search: AtomicUsize,
    state: Arc<RwLock<AnnState>>,
    rebuilding: AtomicBool,
}

impl AnnIndexTier {
    pub fn new(config: AnnIndexConfig) -> Self {
        let state = AnnState {
            graph: config.graph(),
            ..Default::default()
        };

        Self {
            ef_search: AtomicUsize::new(config.ef_search.max(1)),
            config,
            state: Arc::new(RwLock::new(state)),
            rebuilding: AtomicBool::new(false),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(AnnIndexConfig::from_settings(settings))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, AnnState>, CacheError> {
        self.state
            .read()
            .map_err(|e| CacheError::internal(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, AnnState>, CacheError> {
        self.state
            .write()
            .map_err(|e| CacheError::internal(format!("Failed to acquire write lock: {}", e)))
    }

    fn check_dimensions(&self, embedding: &[f32]) -> Result<(), CacheError> {
        if embedding.len() != self.config.dimensions {
            return Err(CacheError::validation(format!(
                "Embedding has {} dimensions, expected {}",
                embedding.len(),
                self.config.dimensions
            )));
        }
        Ok(())
    }

    /// Candidate list breadth of approximate search
    pub fn ef_search(&self) -> usize {
        self.ef_search.load(Ordering::Relaxed)
    }

    /// Adjust the recall/latency knob; never below one
    pub fn set_ef_search(&self, ef_search: usize) {
        self.ef_search.store(ef_search.max(1), Ordering::Relaxed);
    }

    /// Vectors that are indexed and not tombstoned
    pub fn live_len(&self) -> usize {
        self.read().map(|s| s.live_len()).unwrap_or(0)
    }

    #[cfg(test)]
    fn graph_len(&self) -> usize {
        self.read()
            .ok()
            .and_then(|s| s.graph.as_ref().map(CosineGraph::len))
            .unwrap_or(0)
    }

    pub fn metadata(&self, id: usize) -> Option<AnnMetadata> {
        let state = self.read().ok()?;

        if !state.is_live(id) {
            return None;
        }

        state.vectors.get(&id).map(|v| v.meta.clone())
    }

    /// Append a vector, tombstoning any previous id for the same key
    pub fn add(&self, embedding: &[f32], meta: AnnMetadata) -> Result<usize, CacheError> {
        self.check_dimensions(embedding)?;

        if l2_norm(embedding) < f32::EPSILON {
            return Err(CacheError::validation("Cannot index a zero-norm embedding"));
        }

        let mut state = self.write()?;

        let id = state.next_id;
        state.next_id += 1;

        state.tombstone_key(&meta.key);
        state.by_key.insert(meta.key.clone(), id);

        if let Some(graph) = state.graph.as_ref() {
            graph.insert(embedding, id);
        }

        state.vectors.insert(
            id,
            StoredVector {
                embedding: embedding.to_vec(),
                meta,
            },
        );

        Ok(id)
    }

    /// Retire the id currently mapped to `key`
    pub fn tombstone(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.write()?.tombstone_key(key))
    }

    /// Tombstone every live vector older than `ttl`
    pub fn tombstone_expired(&self, ttl: Duration) -> Result<usize, CacheError> {
        let now = Utc::now();

        let mut state = self.write()?;
        let expired: Vec<String> = state
            .vectors
            .iter()
            .filter(|(id, v)| {
                !state.tombstones.contains(id) && expired_at(v.meta.created_at, ttl, now)
            })
            .map(|(_, v)| v.meta.key.clone())
            .collect();

        let mut count = 0;
        for key in expired {
            if state.tombstone_key(&key) {
                count += 1;
            }
        }

        Ok(count)
    }

    /// Drop tombstoned vectors and rebuild the graph from the live ones
    ///
    /// The new graph is built on the blocking pool; vectors added meanwhile
    /// are inserted while the swap holds the write lock. Returns the number
    /// of vectors dropped.
    pub async fn rebuild(&self) -> Result<usize, CacheError> {
        if self.rebuilding.swap(true, Ordering::AcqRel) {
            return Ok(0);
        }

        let result = self.rebuild_inner().await;
        self.rebuilding.store(false, Ordering::Release);
        result
    }

    async fn rebuild_inner(&self) -> Result<usize, CacheError> {
        let started = std::time::Instant::now();

        let fresh = match self.config.graph() {
            Some(graph) => {
                let mut snapshot: Vec<(usize, Vec<f32>)> = {
                    let state = self.read()?;
                    state
                        .vectors
                        .iter()
                        .filter(|(id, _)| !state.tombstones.contains(id))
                        .map(|(id, v)| (*id, v.embedding.clone()))
                        .collect()
                };
                snapshot.sort_unstable_by_key(|(id, _)| *id);

                let built = tokio::task::spawn_blocking(move || {
                    for (id, embedding) in &snapshot {
                        graph.insert(embedding, *id);
                    }
                    let indexed: HashSet<usize> = snapshot.iter().map(|(id, _)| *id).collect();
                    (graph, indexed)
                })
                .await
                .map_err(|e| CacheError::internal(format!("ANN rebuild task failed: {}", e)))?;

                Some(built)
            }
            None => None,
        };

        let mut state = self.write()?;

        let dead: Vec<usize> = state.tombstones.drain().collect();
        for id in &dead {
            state.vectors.remove(id);
        }

        if let Some((graph, indexed)) = fresh {
            let mut late: Vec<usize> = state
                .vectors
                .keys()
                .filter(|id| !indexed.contains(id))
                .copied()
                .collect();
            late.sort_unstable();

            for id in &late {
                if let Some(stored) = state.vectors.get(id) {
                    graph.insert(&stored.embedding, *id);
                }
            }

            state.graph = Some(graph);
        }

        tracing::info!(
            removed = dead.len(),
            live = state.live_len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Rebuilt ANN index"
        );

        Ok(dead.len())
    }

    fn ranked(
        &self,
        state: &AnnState,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Vec<(usize, f32)> {
        if state.live_len() == 0 || k == 0 {
            return Vec::new();
        }

        let score = |id: usize| {
            state
                .vectors
                .get(&id)
                .map(|v| (id, cosine_similarity(query, &v.embedding)))
        };

        let mut scored: Vec<(usize, f32)> = match state.graph.as_ref() {
            Some(graph) => graph
                .search(query, k, self.ef_search(), |id| state.is_live(*id))
                .into_iter()
                .filter_map(score)
                .collect(),
            None => state
                .vectors
                .keys()
                .copied()
                .filter(|id| !state.tombstones.contains(id))
                .filter_map(score)
                .collect(),
        };

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);

        if let Some(filter) = filter {
            scored.retain(|(id, _)| {
                state.vectors.get(id).is_some_and(|v| {
                    filter.matches(
                        &v.meta.provider,
                        &v.meta.model,
                        &Partition::new(&v.meta.company, &v.meta.role),
                    )
                })
            });
        }

        scored
    }

    /// Top-`k` `(id, similarity)` pairs, best first, filtered after retrieval
    pub fn search_ids(
        &self,
        query: &[f32],
        k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<(usize, f32)>, CacheError> {
        self.check_dimensions(query)?;
        let state = self.read()?;
        Ok(self.ranked(&state, query, k, filter))
    }
}

#[async_trait]
impl SimilaritySearchTier for AnnIndexTier {
    fn kind(&self) -> TierKind {
        TierKind::AnnIndex
    }

    async fn search(&self, query: &TierQuery<'_>) -> Result<Vec<SearchResult>, CacheError> {
        self.check_dimensions(query.embedding)?;
        let state = self.read()?;

        let results = self
            .ranked(&state, query.embedding, query.k, Some(query.filter))
            .into_iter()
            .filter_map(|(id, similarity)| {
                state.vectors.get(&id).map(|v| {
                    SearchResult::new(v.meta.to_entry(&v.embedding), similarity, TierKind::AnnIndex)
                })
            })
            .collect();

        Ok(results)
    }

    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.add(entry.embedding(), AnnMetadata::from_entry(entry))
            .map(|_| ())
    }

    async fn remove_expired(&self, ttl: Duration) -> Result<usize, CacheError> {
        self.tombstone_expired(ttl)
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut state = self.write()?;
        let next_id = state.next_id;
        *state = AnnState {
            next_id,
            graph: self.config.graph(),
            ..Default::default()
        };
        Ok(())
    }

    async fn len(&self) -> Result<usize, CacheError> {
        Ok(self.read()?.live_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::embedding::normalize;

    fn config(mode: AnnMode) -> AnnIndexConfig {
        AnnIndexConfig {
            mode,
            dimensions: 3,
            max_connections: 8,
            ef_construction: 64,
            ef_search: 32,
        }
    }

    fn meta(key: &str, provider: &str) -> AnnMetadata {
        AnnMetadata {
            key: key.to_string(),
            company: "Acme".to_string(),
            role: "Engineer".to_string(),
            provider: provider.to_string(),
            model: "gpt-4o".to_string(),
            quality_score: 0.9,
            created_at: Utc::now(),
            token_count: 100,
            cost: 0.01,
        }
    }

    fn vector(i: usize) -> Vec<f32> {
        let angle = i as f32 * 0.37;
        normalize(&[angle.cos(), angle.sin(), 0.2 + (i % 3) as f32 * 0.1])
    }

    fn filled(mode: AnnMode, count: usize) -> AnnIndexTier {
        let index = AnnIndexTier::new(config(mode));
        for i in 0..count {
            index.add(&vector(i), meta(&format!("k{}", i), "openai")).unwrap();
        }
        index
    }

    #[test]
    fn test_flat_search_orders_descending() {
        let index = filled(AnnMode::Flat, 10);

        let results = index.search_ids(&vector(3), 5, None).unwrap();

        assert_eq!(results.len(), 5);
        assert_eq!(index.metadata(results[0].0).unwrap().key, "k3");
        assert!((results[0].1 - 1.0).abs() < 1e-5);
        assert!(results.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_filter_applies_after_retrieval() {
        let index = AnnIndexTier::new(config(AnnMode::Flat));
        index.add(&vector(0), meta("a", "openai")).unwrap();
        index.add(&vector(1), meta("b", "anthropic")).unwrap();

        let filter = SearchFilter::new("anthropic", "gpt-4o");
        let results = index.search_ids(&vector(0), 1, Some(&filter)).unwrap();

        // The single candidate is the openai vector, which the filter drops
        assert!(results.is_empty());

        let results = index.search_ids(&vector(0), 10, Some(&filter)).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(index.metadata(results[0].0).unwrap().key, "b");
    }

    #[test]
    fn test_reinsert_tombstones_previous_id() {
        let index = AnnIndexTier::new(config(AnnMode::Approximate));
        let first = index.add(&vector(0), meta("same", "openai")).unwrap();
        let second = index.add(&vector(1), meta("same", "openai")).unwrap();

        assert_ne!(first, second);
        assert_eq!(index.live_len(), 1);
        assert!(index.metadata(first).is_none());
        assert!(index.metadata(second).is_some());

        let results = index.search_ids(&vector(0), 10, None).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, second);
    }

    #[test]
    fn test_invalid_vectors_are_rejected() {
        let index = AnnIndexTier::new(config(AnnMode::Approximate));

        let err = index.add(&[1.0, 0.0], meta("k", "openai")).unwrap_err();
        assert!(err.is_validation());

        let err = index.add(&[0.0, 0.0, 0.0], meta("k", "openai")).unwrap_err();
        assert!(err.is_validation());

        let err = index.search_ids(&[1.0, 0.0], 5, None).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(index.live_len(), 0);
    }

    #[test]
    fn test_approximate_search_finds_exact_match() {
        let index = filled(AnnMode::Approximate, 40);

        for i in [0, 7, 23, 39] {
            let results = index.search_ids(&vector(i), 1, None).unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(index.metadata(results[0].0).unwrap().key, format!("k{}", i));
            assert!((results[0].1 - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_wide_search_matches_flat_search() {
        let approx = filled(AnnMode::Approximate, 30);
        let flat = filled(AnnMode::Flat, 30);
        approx.set_ef_search(500);

        let query = normalize(&[0.3, 0.9, 0.1]);
        let a = approx.search_ids(&query, 5, None).unwrap();
        let f = flat.search_ids(&query, 5, None).unwrap();

        assert_eq!(a, f);
    }

    #[test]
    fn test_ef_search_is_at_least_one() {
        let index = AnnIndexTier::new(config(AnnMode::Approximate));
        assert_eq!(index.ef_search(), 32);

        index.set_ef_search(0);
        assert_eq!(index.ef_search(), 1);
    }

    #[test]
    fn test_tombstoned_ids_are_skipped_by_graph_search() {
        let index = filled(AnnMode::Approximate, 12);
        assert!(index.tombstone("k5").unwrap());
        assert!(!index.tombstone("k5").unwrap());

        let results = index.search_ids(&vector(5), 3, None).unwrap();

        assert_eq!(results.len(), 3);
        assert!(results
            .iter()
            .all(|(id, _)| index.metadata(*id).is_some_and(|m| m.key != "k5")));
    }

    #[tokio::test]
    async fn test_rebuild_compacts_tombstones() {
        let index = filled(AnnMode::Approximate, 6);
        index.tombstone("k0").unwrap();
        index.tombstone("k1").unwrap();
        assert_eq!(index.live_len(), 4);
        assert_eq!(index.graph_len(), 6);

        assert_eq!(index.rebuild().await.unwrap(), 2);

        assert_eq!(index.live_len(), 4);
        assert_eq!(index.graph_len(), 4);
        assert_eq!(index.search_ids(&vector(2), 10, None).unwrap().len(), 4);

        index.add(&vector(9), meta("k9", "openai")).unwrap();
        let results = index.search_ids(&vector(9), 1, None).unwrap();
        assert_eq!(index.metadata(results[0].0).unwrap().key, "k9");
    }

    #[test]
    fn test_tombstone_expired() {
        let index = AnnIndexTier::new(config(AnnMode::Flat));
        let mut old = meta("old", "openai");
        old.created_at = Utc::now() - chrono::Duration::days(3);
        index.add(&vector(0), old).unwrap();
        index.add(&vector(1), meta("new", "openai")).unwrap();

        assert_eq!(index.tombstone_expired(Duration::from_secs(86_400)).unwrap(), 1);
        assert_eq!(index.live_len(), 1);

        assert_eq!(index.tombstone_expired(Duration::MAX).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_tier_search_returns_entries_without_content() {
        let index = AnnIndexTier::new(config(AnnMode::Approximate));
        index.add(&vector(0), meta("k0", "openai")).unwrap();

        let filter = SearchFilter::new("openai", "gpt-4o");
        let query = TierQuery {
            embedding: &vector(0),
            filter: &filter,
            keys: &[],
            k: 10,
        };
        let results = index.search(&query).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entry().key(), "k0");
        assert!(results[0].entry().content().is_none());
        assert_eq!(results[0].tier(), TierKind::AnnIndex);
    }

    #[tokio::test]
    async fn test_clear_resets_graph() {
        let index = filled(AnnMode::Approximate, 5);

        index.clear().await.unwrap();

        assert_eq!(index.live_len(), 0);
        assert_eq!(index.graph_len(), 0);
        assert!(index.search_ids(&vector(1), 5, None).unwrap().is_empty());
    }
}
