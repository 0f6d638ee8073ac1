//! Bounded in-process key → result tier

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::domain::embedding::cosine_similarity;
use crate::domain::semantic_cache::{
    hot_key, CacheEntry, EvictionPolicy, SearchResult, SimilaritySearchTier, TierKind, TierQuery,
};
use crate::domain::CacheError;

#[derive(Debug)]
struct Slot {
    result: SearchResult,
    inserted_at: u64,
    last_access: AtomicU64,
    access_count: AtomicU64,
}

/// Exact-key cache for hot partitions
///
/// Reads go straight to the sharded map and never wait on writers of other
/// keys. Inserts of new keys are admitted one at a time so the eviction
/// decision and the insert that follows it cannot interleave with another
/// insert, which keeps the tier at or below `max_size`.
#[derive(Debug)]
pub struct MemoryTier {
    slots: DashMap<String, Slot>,
    max_size: usize,
    policy: EvictionPolicy,
    ttl: Duration,
    clock: AtomicU64,
    admission: Mutex<()>,
    evictions: AtomicU64,
}

impl MemoryTier {
    pub fn new(max_size: usize, policy: EvictionPolicy, ttl: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            max_size: max_size.max(1),
            policy,
            ttl,
            clock: AtomicU64::new(0),
            admission: Mutex::new(()),
            evictions: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn policy(&self) -> EvictionPolicy {
        self.policy
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Look up a key, refreshing its recency and frequency
    pub fn get(&self, key: &str) -> Option<SearchResult> {
        let now = Utc::now();

        {
            let slot = self.slots.get(key)?;

            if !slot.result.entry().is_expired_at(self.ttl, now) {
                slot.last_access.store(self.tick(), Ordering::Relaxed);
                slot.access_count.fetch_add(1, Ordering::Relaxed);
                return Some(slot.result.clone());
            }
        }

        self.slots
            .remove_if(key, |_, slot| slot.result.entry().is_expired_at(self.ttl, now));

        None
    }

    /// Insert or replace a key, evicting one entry first when full
    ///
    /// Returns the evicted key, if any.
    pub fn put(&self, key: impl Into<String>, result: SearchResult) -> Option<String> {
        let key = key.into();
        let _admission = self
            .admission
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut evicted = None;

        if !self.slots.contains_key(&key) && self.slots.len() >= self.max_size {
            if let Some(victim) = self.select_victim() {
                self.slots.remove(&victim);
                self.evictions.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key = %victim, policy = %self.policy, "Evicted memory tier slot");
                evicted = Some(victim);
            }
        }

        let now = self.tick();
        self.slots.insert(
            key,
            Slot {
                result,
                inserted_at: now,
                last_access: AtomicU64::new(now),
                access_count: AtomicU64::new(0),
            },
        );

        evicted
    }

    fn select_victim(&self) -> Option<String> {
        let candidates = self.slots.iter().map(|slot| {
            let rank = match self.policy {
                EvictionPolicy::Lru => (slot.last_access.load(Ordering::Relaxed), 0),
                EvictionPolicy::Lfu => (
                    slot.access_count.load(Ordering::Relaxed),
                    slot.last_access.load(Ordering::Relaxed),
                ),
                EvictionPolicy::Fifo => (slot.inserted_at, 0),
            };
            (rank, slot.key().clone())
        });

        candidates.min_by_key(|(rank, _)| *rank).map(|(_, key)| key)
    }

    /// Drop every slot whose entry is older than `ttl`
    pub fn purge_expired(&self, ttl: Duration) -> usize {
        let now = Utc::now();
        let before = self.slots.len();

        self.slots
            .retain(|_, slot| !slot.result.entry().is_expired_at(ttl, now));

        before.saturating_sub(self.slots.len())
    }

    fn touch_entry(&self, key: &str) {
        if let Some(mut slot) = self.slots.get_mut(key) {
            slot.result.entry_mut().record_hit(Utc::now());
        }
    }

    /// Bump hit bookkeeping under `key`, and under `hot` while it still holds the same entry
    pub fn record_entry_hit(&self, key: &str, hot: &str) {
        self.touch_entry(key);

        let aliased = self
            .slots
            .get(hot)
            .is_some_and(|slot| slot.result.entry().key() == key);

        if aliased {
            self.touch_entry(hot);
        }
    }
}

#[async_trait]
impl SimilaritySearchTier for MemoryTier {
    fn kind(&self) -> TierKind {
        TierKind::Memory
    }

    async fn search(&self, query: &TierQuery<'_>) -> Result<Vec<SearchResult>, CacheError> {
        let mut results: Vec<SearchResult> = Vec::new();

        for key in query.keys {
            let Some(found) = self.get(key) else {
                continue;
            };

            let entry = found.entry();

            if entry.content().is_none() || !query.filter.matches_entry(entry) {
                continue;
            }

            if results.iter().any(|r| r.entry().key() == entry.key()) {
                continue;
            }

            let similarity = cosine_similarity(query.embedding, entry.embedding());
            results.push(SearchResult::new(found.into_entry(), similarity, TierKind::Memory));
        }

        results.sort_by(|a, b| {
            b.similarity()
                .partial_cmp(&a.similarity())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(results)
    }

    /// Stores the entry under its identity key and its partition hot key
    async fn insert(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        if entry.content().is_none() {
            return Err(CacheError::validation(
                "memory tier entries must carry their content",
            ));
        }

        let hot = hot_key(entry.partition(), entry.provider(), entry.model());
        let result = SearchResult::new(entry.clone(), 1.0, TierKind::Memory);

        self.put(entry.key(), result.clone());
        self.put(hot, result);

        Ok(())
    }

    async fn record_hit(&self, key: &str) -> Result<(), CacheError> {
        let hot = self.slots.get(key).map(|slot| {
            let entry = slot.result.entry();
            hot_key(entry.partition(), entry.provider(), entry.model())
        });

        if let Some(hot) = hot {
            self.record_entry_hit(key, &hot);
        }

        Ok(())
    }

    async fn remove_expired(&self, ttl: Duration) -> Result<usize, CacheError> {
        Ok(self.purge_expired(ttl))
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.slots.clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize, CacheError> {
        Ok(self.slots.len())
    }
}
