//! Tier coordination for semantic lookups and writes
//!
//! Reads fall through memory → ANN → persistent vector store and stop at the
//! first candidate whose ranking score clears the request's threshold. Writes
//! fan out to every tier; only the in-process tiers have to succeed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::domain::cache::Cache;
use crate::domain::embedding::validate_embedding;
use crate::domain::semantic_cache::{
    content_hash, hot_key, identity_key, quality_score, CacheEntry, CacheHit, CacheSettings,
    CacheStats, EntryMetadata, LookupContext, Partition, SearchFilter, SearchResult,
    SimilaritySearchTier, StoreOutcome, ThresholdPolicy, TierKind, TierQuery, VectorStore,
};
use crate::domain::CacheError;
use crate::infrastructure::resilience::{CircuitBreaker, CircuitBreakerConfig};
use crate::infrastructure::semantic_cache::{
    AnnIndexTier, DurableContentStore, MemoryTier, PersistentVectorTier,
};

const VECTOR_STORE_BREAKER: &str = "vector_store";
const CONTENT_STORE_BREAKER: &str = "content_store";

/// One write handed to [`CacheOrchestrator::store_batch`]
#[derive(Debug, Clone)]
pub struct StoreRequest {
    pub content: String,
    pub embedding: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// Entries removed by [`CacheOrchestrator::cleanup_expired`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub memory: usize,
    pub ann: usize,
    /// `None` when the persistent store could not be reached
    pub persistent: Option<usize>,
}

#[derive(Debug, Default)]
struct Counters {
    total_requests: u64,
    hits: u64,
    misses: u64,
    hits_by_tier: HashMap<TierKind, u64>,
    cost_saved: f64,
    tokens_saved: u64,
    similarity_sum: f64,
    quality_rejections: u64,
    durable_write_failures: u64,
}

enum Prepared {
    Accepted(CacheEntry),
    Rejected(f64),
}

/// The cache façade
///
/// Construct one per process and share it behind an `Arc`. Call
/// [`shutdown`](Self::shutdown) before exit to flush hit bookkeeping.
#[derive(Debug)]
pub struct CacheOrchestrator {
    settings: CacheSettings,
    policy: ThresholdPolicy,
    memory: Arc<MemoryTier>,
    ann: Arc<AnnIndexTier>,
    persistent: Arc<PersistentVectorTier>,
    content: Arc<DurableContentStore>,
    tiers: Vec<Arc<dyn SimilaritySearchTier>>,
    counters: Mutex<Counters>,
    background: Mutex<JoinSet<()>>,
}

impl CacheOrchestrator {
    /// Build every tier from validated settings
    pub fn new(
        settings: CacheSettings,
        vector_store: Arc<dyn VectorStore>,
        content_cache: Arc<dyn Cache>,
    ) -> Result<Self, CacheError> {
        settings.validate()?;

        let breaker_config = CircuitBreakerConfig::from_settings(&settings);

        let memory = Arc::new(MemoryTier::new(
            settings.max_memory_entries,
            settings.eviction_policy,
            settings.ttl(),
        ));
        let ann = Arc::new(AnnIndexTier::from_settings(&settings));
        let persistent = Arc::new(PersistentVectorTier::new(
            vector_store,
            Arc::new(CircuitBreaker::with_config(
                VECTOR_STORE_BREAKER,
                breaker_config.clone(),
            )),
        ));
        let content = Arc::new(DurableContentStore::new(
            content_cache,
            Arc::new(CircuitBreaker::with_config(CONTENT_STORE_BREAKER, breaker_config)),
        ));

        let tiers: Vec<Arc<dyn SimilaritySearchTier>> =
            vec![memory.clone(), ann.clone(), persistent.clone()];

        info!(
            base_threshold = settings.similarity_base_threshold,
            max_memory_entries = settings.max_memory_entries,
            eviction_policy = %settings.eviction_policy,
            ann_mode = ?settings.ann_mode,
            dimensions = settings.dimensions,
            "Semantic cache initialized"
        );

        Ok(Self {
            policy: ThresholdPolicy::new(settings.similarity_base_threshold),
            settings,
            memory,
            ann,
            persistent,
            content,
            tiers,
            counters: Mutex::new(Counters::default()),
            background: Mutex::new(JoinSet::new()),
        })
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub fn ann(&self) -> &AnnIndexTier {
        &self.ann
    }

    fn counters(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_backend(provider: &str, model: &str) -> Result<(), CacheError> {
        if provider.trim().is_empty() || model.trim().is_empty() {
            return Err(CacheError::validation("provider and model are required"));
        }
        Ok(())
    }

    /// Company/role exact-match bonus added to the ranking score
    fn preference_bonus(&self, entry: &CacheEntry, context: &LookupContext) -> f64 {
        let meta = entry.metadata();
        let mut bonus = 0.0;

        if !context.company.is_empty() && meta.company.to_lowercase() == context.company.to_lowercase()
        {
            bonus += self.settings.company_match_bonus;
        }

        if !context.role.is_empty() && meta.role.to_lowercase() == context.role.to_lowercase() {
            bonus += self.settings.role_match_bonus;
        }

        bonus
    }

    /// Best unexpired candidate of one tier, with its ranking score
    fn best_candidate(
        &self,
        results: Vec<SearchResult>,
        filter: &SearchFilter,
        context: &LookupContext,
    ) -> Option<(SearchResult, f64)> {
        let now = Utc::now();
        let ttl = self.settings.ttl();

        results
            .into_iter()
            .filter(|r| filter.matches_entry(r.entry()) && !r.entry().is_expired_at(ttl, now))
            .map(|r| {
                let rank = r.similarity() as f64 + self.preference_bonus(r.entry(), context);
                (r, rank)
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
    }

    async fn resolve_content(&self, result: &SearchResult) -> Option<String> {
        if let Some(content) = result.entry().content() {
            return Some(content.to_string());
        }

        match self.content.get(result.entry().key()).await {
            Ok(Some(content)) => Some(content),
            Ok(None) => {
                debug!(
                    key = result.entry().key(),
                    tier = %result.tier(),
                    "Vector hit without content, treating as miss"
                );
                None
            }
            Err(e) => {
                warn!(tier = %result.tier(), error = %e, "Content resolution failed");
                metrics::counter!("semantic_cache_tier_errors_total", "tier" => "content_store")
                    .increment(1);
                None
            }
        }
    }

    /// Find a cached result for a semantically similar request
    ///
    /// Only validation errors surface; tier failures degrade to a miss.
    pub async fn lookup(
        &self,
        query_text: &str,
        embedding: &[f32],
        provider: &str,
        model: &str,
        context: &LookupContext,
    ) -> Result<Option<CacheHit>, CacheError> {
        validate_embedding(embedding, self.settings.dimensions)?;
        Self::check_backend(provider, model)?;

        self.counters().total_requests += 1;

        let population = self.ann.live_len();
        let threshold = self.policy.compute(&context.threshold, population);

        let partition = context.partition();
        let mut filter = SearchFilter::new(provider, model);
        if self.settings.partition_scoped_search {
            filter = filter.with_partition(partition.clone());
        }

        let keys = [
            identity_key(&partition, &content_hash(query_text, provider, model)),
            hot_key(&partition, provider, model),
        ];

        for tier in &self.tiers {
            let k = match tier.kind() {
                TierKind::PersistentVector => self.settings.effective_persistent_k(),
                _ => self.settings.effective_candidate_k(),
            };

            let query = TierQuery {
                embedding,
                filter: &filter,
                keys: &keys,
                k,
            };

            let results = match tier.search(&query).await {
                Ok(results) => results,
                Err(e) => {
                    warn!(tier = %tier.kind(), error = %e, "Tier search failed, falling through");
                    metrics::counter!("semantic_cache_tier_errors_total", "tier" => tier.kind().as_str())
                        .increment(1);
                    continue;
                }
            };

            let Some((best, rank)) = self.best_candidate(results, &filter, context) else {
                continue;
            };

            if rank < threshold {
                debug!(
                    tier = %tier.kind(),
                    similarity = best.similarity(),
                    rank,
                    threshold,
                    "Best candidate below threshold"
                );
                continue;
            }

            let Some(content) = self.resolve_content(&best).await else {
                continue;
            };

            return Ok(Some(self.on_hit(best, content, threshold)));
        }

        self.counters().misses += 1;
        metrics::counter!("semantic_cache_lookups_total", "result" => "miss").increment(1);
        debug!(provider, model, partition = %partition, threshold, "Semantic cache miss");

        Ok(None)
    }

    fn on_hit(&self, result: SearchResult, content: String, threshold: f64) -> CacheHit {
        let tier = result.tier();
        let similarity = result.similarity();
        let entry = result.into_entry();
        let key = entry.key().to_string();

        {
            let mut counters = self.counters();
            counters.hits += 1;
            *counters.hits_by_tier.entry(tier).or_insert(0) += 1;
            counters.cost_saved += entry.metadata().cost;
            counters.tokens_saved += entry.metadata().token_count as u64;
            counters.similarity_sum += similarity as f64;
        }

        metrics::counter!("semantic_cache_lookups_total", "result" => "hit").increment(1);
        metrics::counter!("semantic_cache_hits_total", "tier" => tier.as_str()).increment(1);
        metrics::histogram!("semantic_cache_hit_similarity").record(similarity as f64);

        debug!(tier = %tier, similarity, threshold, key = %key, "Semantic cache hit");

        let hot = hot_key(entry.partition(), entry.provider(), entry.model());

        if tier != TierKind::Memory {
            let promoted = SearchResult::new(entry.with_content(content.clone()), 1.0, TierKind::Memory);
            self.memory.put(key.clone(), promoted.clone());
            self.memory.put(hot.clone(), promoted);
        }

        self.spawn_hit_bookkeeping(key.clone(), hot);

        CacheHit {
            content,
            similarity,
            tier,
            key,
        }
    }

    fn spawn_hit_bookkeeping(&self, key: String, hot: String) {
        let memory = self.memory.clone();
        let persistent = self.persistent.clone();

        let mut tasks = self.background.lock().unwrap_or_else(PoisonError::into_inner);
        while tasks.try_join_next().is_some() {}

        tasks.spawn(async move {
            memory.record_entry_hit(&key, &hot);

            if let Err(e) = persistent.record_hit(&key).await {
                debug!(key = %key, error = %e, "Failed to record hit in vector store");
            }
        });
    }

    fn prepare(
        &self,
        content: &str,
        embedding: &[f32],
        metadata: EntryMetadata,
    ) -> Result<Prepared, CacheError> {
        validate_embedding(embedding, self.settings.dimensions)?;
        Self::check_backend(&metadata.provider, &metadata.model)?;

        if content.trim().is_empty() {
            return Err(CacheError::validation("content must not be empty"));
        }

        let score = quality_score(content, &metadata);

        if score < self.settings.min_quality_score {
            self.counters().quality_rejections += 1;
            metrics::counter!("semantic_cache_writes_total", "outcome" => "rejected").increment(1);
            debug!(
                score,
                min = self.settings.min_quality_score,
                company = %metadata.company,
                "Entry rejected for low quality"
            );
            return Ok(Prepared::Rejected(score));
        }

        Ok(Prepared::Accepted(CacheEntry::new(
            content,
            embedding.to_vec(),
            metadata,
            score,
        )))
    }

    fn record_durable_failure(&self, dependency: &str, error: &CacheError) {
        self.counters().durable_write_failures += 1;
        metrics::counter!("semantic_cache_tier_errors_total", "tier" => dependency.to_string())
            .increment(1);
        warn!(dependency, error = %error, "Durable write failed, entry kept in process only");
    }

    async fn insert_in_process(&self, entry: &CacheEntry, vector_entry: &CacheEntry) -> Result<(), CacheError> {
        let (memory, ann) = tokio::join!(self.memory.insert(entry), self.ann.insert(vector_entry));
        memory?;
        ann
    }

    /// Write a generated result to every tier
    ///
    /// Low-quality content is discarded and reported as
    /// [`StoreOutcome::QualityRejected`]. Durable tier failures are logged and
    /// counted but do not fail the call.
    pub async fn store(
        &self,
        content: &str,
        embedding: &[f32],
        metadata: EntryMetadata,
    ) -> Result<StoreOutcome, CacheError> {
        let entry = match self.prepare(content, embedding, metadata)? {
            Prepared::Accepted(entry) => entry,
            Prepared::Rejected(score) => return Ok(StoreOutcome::QualityRejected { score }),
        };

        let key = entry.key().to_string();
        let vector_entry = entry.without_content();
        let ttl = self.settings.ttl();

        let (in_process, persistent, durable) = tokio::join!(
            self.insert_in_process(&entry, &vector_entry),
            self.persistent.insert(&vector_entry),
            self.content.put(&key, content, ttl),
        );

        in_process?;

        let mut degraded = false;
        if let Err(e) = persistent {
            self.record_durable_failure(VECTOR_STORE_BREAKER, &e);
            degraded = true;
        }
        if let Err(e) = durable {
            self.record_durable_failure(CONTENT_STORE_BREAKER, &e);
            degraded = true;
        }

        let outcome = if degraded { "degraded" } else { "stored" };
        metrics::counter!("semantic_cache_writes_total", "outcome" => outcome).increment(1);
        debug!(key = %key, quality = entry.quality_score(), outcome, "Stored cache entry");

        Ok(StoreOutcome::Stored { key })
    }

    /// Store several results, writing the vector store in one batch
    ///
    /// Each request goes through the same validation and quality gate as
    /// [`store`](Self::store); results are returned in request order.
    pub async fn store_batch(
        &self,
        requests: Vec<StoreRequest>,
    ) -> Vec<Result<StoreOutcome, CacheError>> {
        let mut outcomes: Vec<Result<StoreOutcome, CacheError>> = Vec::with_capacity(requests.len());
        let mut accepted: Vec<(usize, CacheEntry)> = Vec::new();

        for request in requests {
            match self.prepare(&request.content, &request.embedding, request.metadata) {
                Ok(Prepared::Accepted(entry)) => {
                    accepted.push((outcomes.len(), entry));
                    outcomes.push(Ok(StoreOutcome::Stored { key: String::new() }));
                }
                Ok(Prepared::Rejected(score)) => {
                    outcomes.push(Ok(StoreOutcome::QualityRejected { score }))
                }
                Err(e) => outcomes.push(Err(e)),
            }
        }

        if accepted.is_empty() {
            return outcomes;
        }

        let ttl = self.settings.ttl();
        let vector_entries: Vec<CacheEntry> =
            accepted.iter().map(|(_, e)| e.without_content()).collect();

        for ((index, entry), vector_entry) in accepted.iter().zip(&vector_entries) {
            outcomes[*index] = self
                .insert_in_process(entry, vector_entry)
                .await
                .map(|_| StoreOutcome::Stored {
                    key: entry.key().to_string(),
                });
        }

        let content_writes = futures::future::join_all(accepted.iter().map(|(_, entry)| {
            self.content
                .put(entry.key(), entry.content().unwrap_or_default(), ttl)
        }));

        let (persistent, durable) =
            tokio::join!(self.persistent.insert_batch(&vector_entries), content_writes);

        if let Err(e) = persistent {
            for _ in &vector_entries {
                self.record_durable_failure(VECTOR_STORE_BREAKER, &e);
            }
        }

        for result in durable {
            if let Err(e) = result {
                self.record_durable_failure(CONTENT_STORE_BREAKER, &e);
            }
        }

        metrics::counter!("semantic_cache_writes_total", "outcome" => "batch")
            .increment(accepted.len() as u64);

        outcomes
    }

    /// Place the best persistent match for a partition under its hot key
    ///
    /// Returns `false` when the partition is already hot or nothing usable
    /// was found.
    pub async fn preload_hot(
        &self,
        partition: &Partition,
        provider: &str,
        model: &str,
        embedding: &[f32],
    ) -> Result<bool, CacheError> {
        validate_embedding(embedding, self.settings.dimensions)?;

        let hot = hot_key(partition, provider, model);
        if self.memory.contains(&hot) {
            return Ok(false);
        }

        let filter = SearchFilter::new(provider, model).with_partition(partition.clone());
        let query = TierQuery {
            embedding,
            filter: &filter,
            keys: &[],
            k: 1,
        };

        let results = self.persistent.search(&query).await?;
        let ttl = self.settings.ttl();
        let now = Utc::now();

        let Some(best) = results
            .into_iter()
            .find(|r| !r.entry().is_expired_at(ttl, now))
        else {
            return Ok(false);
        };

        let Some(content) = self.resolve_content(&best).await else {
            return Ok(false);
        };

        let similarity = best.similarity();
        let entry = best.into_entry().with_content(content);
        self.memory
            .put(hot, SearchResult::new(entry, similarity, TierKind::Memory));

        Ok(true)
    }

    pub fn stats(&self) -> CacheStats {
        let counters = self.counters();

        let hit_ratio = if counters.total_requests == 0 {
            0.0
        } else {
            counters.hits as f64 / counters.total_requests as f64
        };

        let average_similarity = if counters.hits == 0 {
            0.0
        } else {
            counters.similarity_sum / counters.hits as f64
        };

        CacheStats {
            total_requests: counters.total_requests,
            hits: counters.hits,
            misses: counters.misses,
            hit_ratio,
            hits_by_tier: counters.hits_by_tier.clone(),
            total_cost_saved: counters.cost_saved,
            total_tokens_saved: counters.tokens_saved,
            average_similarity,
            quality_rejections: counters.quality_rejections,
            durable_write_failures: counters.durable_write_failures,
            memory_entries: self.memory.size(),
            ann_entries: self.ann.live_len(),
            breakers: self
                .tiers
                .iter()
                .filter_map(|t| t.breaker())
                .chain(std::iter::once(self.content.breaker()))
                .collect(),
        }
    }

    /// Empty every tier, continuing past individual failures
    pub async fn clear(&self) -> Result<(), CacheError> {
        let mut failures = Vec::new();

        for tier in &self.tiers {
            if let Err(e) = tier.clear().await {
                failures.push(format!("{}: {}", tier.kind(), e));
            }
        }

        if let Err(e) = self.content.delete_all().await {
            failures.push(format!("{}: {}", CONTENT_STORE_BREAKER, e));
        }

        if failures.is_empty() {
            info!("Semantic cache cleared");
            Ok(())
        } else {
            warn!(failures = failures.len(), "Semantic cache partially cleared");
            Err(CacheError::partial_failure(failures))
        }
    }

    /// Drop entries older than the configured TTL from every tier
    pub async fn cleanup_expired(&self) -> Result<CleanupReport, CacheError> {
        let ttl = self.settings.ttl();

        let memory = self.memory.remove_expired(ttl).await?;
        let ann = self.ann.remove_expired(ttl).await?;
        if ann > 0 {
            self.ann.rebuild().await?;
        }
        let persistent = match self.persistent.remove_expired(ttl).await {
            Ok(removed) => Some(removed),
            Err(e) => {
                warn!(error = %e, "Persistent cleanup failed");
                None
            }
        };

        let report = CleanupReport {
            memory,
            ann,
            persistent,
        };
        info!(?report, "Expired cache entries cleaned up");

        Ok(report)
    }

    /// Delete persistent entries older than `max_age`
    pub async fn purge_older_than(&self, max_age: Duration) -> Result<usize, CacheError> {
        let removed = self.persistent.remove_expired(max_age).await?;
        info!(removed, max_age_secs = max_age.as_secs(), "Purged persistent entries");
        Ok(removed)
    }

    /// Wait for outstanding hit bookkeeping
    pub async fn shutdown(&self) {
        let mut tasks = {
            let mut guard = self.background.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!(error = %e, "Hit bookkeeping task failed");
            }
        }

        debug!("Semantic cache shut down");
    }
}
