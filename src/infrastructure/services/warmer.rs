//! Cache warming and memory-tier preloading for popular partitions

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::orchestrator::{CacheOrchestrator, StoreRequest};
use crate::domain::embedding::EmbeddingProvider;
use crate::domain::semantic_cache::{EntryMetadata, Partition, StoreOutcome};
use crate::domain::CacheError;

/// Phrasings used to synthesize representative job descriptions
const JD_TEMPLATES: &[&str] = &[
    "We are looking for a {role} to join our {company} team. The ideal candidate will have experience with {skills} and {experience} years of experience.",
    "{company} is seeking a talented {role} to work on innovative products. Requirements include {skills} and a relevant degree.",
    "Join {company} as a {role}! You will be responsible for developing high-quality solutions with {skills}.",
    "{role} position at {company}. We offer competitive salary and benefits and are looking for someone with {skills} experience.",
    "{company} is hiring a {role}. The role involves building scalable solutions and requires {skills}.",
];

const EXPERIENCE_LEVELS: &[&str] = &["2-3", "3-5", "5+", "1-2"];

const GENERIC_SKILLS: &[&str] = &["Communication", "Problem Solving", "Teamwork"];

const SKILLS_PER_TEMPLATE: usize = 3;

/// Estimated usage recorded on warmed entries
const WARMED_TOKEN_COUNT: u32 = 150;
const WARMED_COST: f64 = 0.01;

const PRELOAD_MAX_COMPANIES: usize = 25;
const PRELOAD_MAX_ROLES: usize = 20;
const PRELOAD_SHARE_OF_MEMORY: f64 = 0.3;
const PEAK_PRELOAD_FACTOR: f64 = 2.0;

fn role_skills(role: &str) -> &'static [&'static str] {
    match role.trim().to_lowercase().as_str() {
        "software engineer" => &["Python", "JavaScript", "React", "Node.js", "AWS", "Docker"],
        "data scientist" => &["Python", "R", "Machine Learning", "SQL", "TensorFlow", "Pandas"],
        "product manager" => &["Product Strategy", "Analytics", "Agile", "User Research", "SQL"],
        "marketing manager" => &["Digital Marketing", "SEO", "Content Strategy", "Analytics"],
        "sales engineer" => &[
            "Technical Sales",
            "CRM",
            "Solution Architecture",
            "Customer Success",
        ],
        "devops engineer" => &[
            "Kubernetes",
            "AWS",
            "CI/CD",
            "Infrastructure as Code",
            "Monitoring",
        ],
        _ => GENERIC_SKILLS,
    }
}

/// One synthesized request to warm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmingTemplate {
    pub query_text: String,
    pub company: String,
    pub role: String,
    pub skills: Vec<String>,
}

impl WarmingTemplate {
    /// Build the `index`-th phrasing for a partition
    pub fn synthesize(company: &str, role: &str, index: usize) -> Self {
        let skills: Vec<String> = role_skills(role)
            .iter()
            .take(SKILLS_PER_TEMPLATE)
            .map(|s| s.to_string())
            .collect();

        let query_text = JD_TEMPLATES[index % JD_TEMPLATES.len()]
            .replace("{company}", company)
            .replace("{role}", role)
            .replace("{skills}", &skills.join(", "))
            .replace("{experience}", EXPERIENCE_LEVELS[index % EXPERIENCE_LEVELS.len()]);

        Self {
            query_text,
            company: company.to_string(),
            role: role.to_string(),
            skills,
        }
    }

    /// Templates for every `(company, role)` pair within the configured limits
    pub fn for_partitions(
        companies: &[String],
        roles: &[String],
        max_companies: usize,
        max_roles: usize,
        per_partition: usize,
    ) -> Vec<Self> {
        companies
            .iter()
            .take(max_companies)
            .flat_map(|company| {
                roles.iter().take(max_roles).flat_map(move |role| {
                    (0..per_partition).map(move |i| Self::synthesize(company, role, i))
                })
            })
            .collect()
    }
}

/// Supplies the content stored for a warmed template
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WarmingContentSource: Send + Sync + Debug {
    async fn content_for(&self, template: &WarmingTemplate) -> Result<String, CacheError>;
}

/// Writes a short synthetic cover letter naming the company and skills
#[derive(Debug, Clone, Default)]
pub struct TemplateContentSource;

#[async_trait]
impl WarmingContentSource for TemplateContentSource {
    async fn content_for(&self, template: &WarmingTemplate) -> Result<String, CacheError> {
        Ok(format!(
            "Dear {company} hiring team,\n\nI am excited to apply for the {role} position at {company}. \
             With my experience in {skills}, I believe I would be a great fit for your team. \
             I would welcome the opportunity to discuss how I can contribute.\n\nSincerely,\nA candidate",
            company = template.company,
            role = template.role,
            skills = template.skills.join(", "),
        ))
    }
}

/// Outcome of a warming run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WarmingStats {
    pub templates_processed: usize,
    pub warmed_entries: usize,
    pub rejected_entries: usize,
    pub failed_entries: usize,
    pub elapsed: Duration,
    pub rate_per_second: f64,
    /// Warming is disabled in configuration
    pub skipped: bool,
}

impl WarmingStats {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Default::default()
        }
    }
}

/// Historical usage feeding [`CacheWarmer::preload`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageAnalytics {
    #[serde(default)]
    pub top_companies: Vec<String>,
    #[serde(default)]
    pub top_roles: Vec<String>,
    #[serde(default = "default_peak_hours")]
    pub peak_hours: Vec<u32>,
    #[serde(default)]
    pub company_frequencies: HashMap<String, f64>,
    #[serde(default)]
    pub role_frequencies: HashMap<String, f64>,
    /// Keyed by `"{company}:{role}"`
    #[serde(default)]
    pub company_role_frequencies: HashMap<String, f64>,
    /// Keyed by `"{company}:{role}"`, defaults to 1.0
    #[serde(default)]
    pub recency_multipliers: HashMap<String, f64>,
}

fn default_peak_hours() -> Vec<u32> {
    (9..=17).collect()
}

impl Default for UsageAnalytics {
    fn default() -> Self {
        Self {
            top_companies: Vec::new(),
            top_roles: Vec::new(),
            peak_hours: default_peak_hours(),
            company_frequencies: HashMap::new(),
            role_frequencies: HashMap::new(),
            company_role_frequencies: HashMap::new(),
            recency_multipliers: HashMap::new(),
        }
    }
}

impl UsageAnalytics {
    /// Weighted popularity of one `(company, role)` pair
    pub fn popularity(&self, company: &str, role: &str) -> f64 {
        let combo = format!("{}:{}", company, role);

        let company_freq = self.company_frequencies.get(company).copied().unwrap_or(0.0);
        let role_freq = self.role_frequencies.get(role).copied().unwrap_or(0.0);
        let combo_freq = self
            .company_role_frequencies
            .get(&combo)
            .copied()
            .unwrap_or(0.0);
        let recency = self.recency_multipliers.get(&combo).copied().unwrap_or(1.0);

        (company_freq * 0.3 + role_freq * 0.3 + combo_freq * 0.4) * recency
    }

    /// Every candidate pair, most popular first
    pub fn ranked_patterns(&self) -> Vec<(String, String, f64)> {
        let mut patterns: Vec<(String, String, f64)> = self
            .top_companies
            .iter()
            .take(PRELOAD_MAX_COMPANIES)
            .flat_map(|company| {
                self.top_roles.iter().take(PRELOAD_MAX_ROLES).map(move |role| {
                    (company.clone(), role.clone(), self.popularity(company, role))
                })
            })
            .collect();

        patterns.sort_by(|a, b| {
            b.2.partial_cmp(&a.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
                .then_with(|| a.1.cmp(&b.1))
        });

        patterns
    }
}

/// Outcome of a preload run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PreloadStats {
    pub patterns_analyzed: usize,
    pub preloaded: usize,
    pub failed: usize,
    pub is_peak_time: bool,
    pub preload_factor: f64,
    pub budget: usize,
    pub elapsed: Duration,
    pub skipped: bool,
}

/// Precomputes entries for popular partitions
///
/// Warmed entries go through [`CacheOrchestrator::store_batch`], so they pass
/// the same validation and quality gate as organic writes.
#[derive(Debug)]
pub struct CacheWarmer {
    cache: Arc<CacheOrchestrator>,
    embeddings: Arc<dyn EmbeddingProvider>,
    content: Arc<dyn WarmingContentSource>,
    provider: String,
    model: String,
}

impl CacheWarmer {
    pub fn new(
        cache: Arc<CacheOrchestrator>,
        embeddings: Arc<dyn EmbeddingProvider>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            embeddings,
            content: Arc::new(TemplateContentSource),
            provider: provider.into(),
            model: model.into(),
        }
    }

    pub fn with_content_source(mut self, content: Arc<dyn WarmingContentSource>) -> Self {
        self.content = content;
        self
    }

    /// Warm the cache for every `(company, role)` pair
    ///
    /// Per-template failures are counted and never abort the run.
    pub async fn warm(
        &self,
        companies: &[String],
        roles: &[String],
    ) -> Result<WarmingStats, CacheError> {
        let settings = self.cache.settings();

        if !settings.warming_enabled {
            info!("Cache warming disabled in configuration");
            return Ok(WarmingStats::skipped());
        }

        let started = Instant::now();
        let templates = WarmingTemplate::for_partitions(
            companies,
            roles,
            settings.warming_max_companies,
            settings.warming_max_roles,
            settings.warming_templates_per_partition,
        );

        info!(
            companies = companies.len().min(settings.warming_max_companies),
            roles = roles.len().min(settings.warming_max_roles),
            templates = templates.len(),
            "Starting cache warming"
        );

        let mut stats = WarmingStats {
            templates_processed: templates.len(),
            ..Default::default()
        };

        let batches: Vec<&[WarmingTemplate]> =
            templates.chunks(settings.warming_batch_size).collect();
        let batch_count = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            self.warm_batch(batch, &mut stats).await;

            debug!(
                batch = index + 1,
                of = batch_count,
                warmed = stats.warmed_entries,
                failed = stats.failed_entries,
                "Warming batch complete"
            );

            if index + 1 < batch_count {
                tokio::time::sleep(settings.warming_batch_pause()).await;
            }
        }

        stats.elapsed = started.elapsed();
        let secs = stats.elapsed.as_secs_f64();
        stats.rate_per_second = if secs > 0.0 {
            stats.templates_processed as f64 / secs
        } else {
            0.0
        };

        info!(
            warmed = stats.warmed_entries,
            rejected = stats.rejected_entries,
            failed = stats.failed_entries,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            rate_per_second = stats.rate_per_second,
            "Cache warming completed"
        );

        Ok(stats)
    }

    async fn warm_batch(&self, batch: &[WarmingTemplate], stats: &mut WarmingStats) {
        let texts: Vec<String> = batch.iter().map(|t| t.query_text.clone()).collect();

        let embeddings = match self.embeddings.embed_batch(&texts).await {
            Ok(embeddings) if embeddings.len() == batch.len() => embeddings,
            Ok(embeddings) => {
                warn!(
                    expected = batch.len(),
                    received = embeddings.len(),
                    "Embedding batch size mismatch, skipping batch"
                );
                stats.failed_entries += batch.len();
                return;
            }
            Err(e) => {
                warn!(error = %e, size = batch.len(), "Failed to embed warming batch");
                stats.failed_entries += batch.len();
                return;
            }
        };

        let mut requests = Vec::with_capacity(batch.len());

        for (template, embedding) in batch.iter().zip(embeddings) {
            match self.content.content_for(template).await {
                Ok(content) => requests.push(StoreRequest {
                    content,
                    embedding,
                    metadata: EntryMetadata::new(&template.query_text, &self.provider, &self.model)
                        .with_company(&template.company)
                        .with_role(&template.role)
                        .with_skills(template.skills.iter().cloned())
                        .with_usage(WARMED_TOKEN_COUNT, WARMED_COST),
                }),
                Err(e) => {
                    warn!(company = %template.company, role = %template.role, error = %e, "No content for warming template");
                    stats.failed_entries += 1;
                }
            }
        }

        for outcome in self.cache.store_batch(requests).await {
            match outcome {
                Ok(StoreOutcome::Stored { .. }) => stats.warmed_entries += 1,
                Ok(StoreOutcome::QualityRejected { .. }) => stats.rejected_entries += 1,
                Err(e) => {
                    debug!(error = %e, "Warming entry failed");
                    stats.failed_entries += 1;
                }
            }
        }
    }

    /// Place the best stored entry of each popular partition in the memory tier
    ///
    /// `hour` is the local hour of day used to detect peak periods.
    pub async fn preload(
        &self,
        analytics: &UsageAnalytics,
        hour: u32,
    ) -> Result<PreloadStats, CacheError> {
        let settings = self.cache.settings();

        if !settings.warming_enabled {
            return Ok(PreloadStats {
                skipped: true,
                ..Default::default()
            });
        }

        let started = Instant::now();
        let is_peak_time = analytics.peak_hours.contains(&hour);
        let preload_factor = if is_peak_time { PEAK_PRELOAD_FACTOR } else { 1.0 };
        let budget =
            (settings.max_memory_entries as f64 * PRELOAD_SHARE_OF_MEMORY * preload_factor) as usize;

        if is_peak_time {
            info!(hour, "Peak hours detected, preloading aggressively");
        }

        let patterns = analytics.ranked_patterns();
        let mut stats = PreloadStats {
            patterns_analyzed: patterns.len(),
            is_peak_time,
            preload_factor,
            budget,
            ..Default::default()
        };

        let selected: Vec<&(String, String, f64)> = patterns.iter().take(budget).collect();

        for chunk in selected.chunks(settings.warming_batch_size) {
            let texts: Vec<String> = chunk
                .iter()
                .map(|(company, role, _)| format!("{} position at {}", role, company))
                .collect();

            let embeddings = match self.embeddings.embed_batch(&texts).await {
                Ok(embeddings) => embeddings,
                Err(e) => {
                    warn!(error = %e, "Failed to embed preload patterns");
                    stats.failed += chunk.len();
                    continue;
                }
            };

            let preloads = chunk.iter().zip(&embeddings).map(|((company, role, score), embedding)| {
                let partition = Partition::new(company, role);
                async move {
                    let result = self
                        .cache
                        .preload_hot(&partition, &self.provider, &self.model, embedding)
                        .await;
                    (partition, *score, result)
                }
            });

            for (partition, score, result) in futures::future::join_all(preloads).await {
                match result {
                    Ok(true) => {
                        debug!(partition = %partition, score, "Preloaded pattern");
                        stats.preloaded += 1;
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!(partition = %partition, error = %e, "Failed to preload pattern");
                        stats.failed += 1;
                    }
                }
            }
        }

        stats.elapsed = started.elapsed();

        info!(
            preloaded = stats.preloaded,
            analyzed = stats.patterns_analyzed,
            budget,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "Cache preloading completed"
        );

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::{Cache, MockCache};
    use crate::domain::embedding::{normalize, MockEmbeddingProvider};
    use crate::domain::semantic_cache::{CacheSettings, LookupContext, VectorStore};
    use crate::infrastructure::vector_store::InMemoryVectorStore;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn orchestrator(settings: CacheSettings) -> (Arc<CacheOrchestrator>, Arc<InMemoryVectorStore>) {
        let store = Arc::new(InMemoryVectorStore::new());
        let cache = CacheOrchestrator::new(settings, store.clone(), Arc::new(MockCache::new()))
            .unwrap();
        (Arc::new(cache), store)
    }

    fn settings() -> CacheSettings {
        CacheSettings::default()
            .with_dimensions(4)
            .with_warming_batch(2, Duration::from_millis(1))
    }

    #[test]
    fn test_templates_use_role_skills() {
        let template = WarmingTemplate::synthesize("Acme", "Data Scientist", 0);

        assert_eq!(template.skills, strings(&["Python", "R", "Machine Learning"]));
        assert!(template.query_text.contains("Acme"));
        assert!(template.query_text.contains("Data Scientist"));
        assert!(template.query_text.contains("Python, R, Machine Learning"));

        let generic = WarmingTemplate::synthesize("Acme", "Astronaut", 1);
        assert_eq!(generic.skills, strings(GENERIC_SKILLS));
    }

    #[test]
    fn test_templates_respect_limits() {
        let templates = WarmingTemplate::for_partitions(
            &strings(&["A", "B", "C"]),
            &strings(&["x", "y"]),
            2,
            1,
            3,
        );

        assert_eq!(templates.len(), 6);
        assert!(templates.iter().all(|t| t.role == "x" && t.company != "C"));

        let distinct: std::collections::HashSet<_> =
            templates.iter().map(|t| t.query_text.clone()).collect();
        assert_eq!(distinct.len(), 6);
    }

    #[tokio::test]
    async fn test_template_content_passes_quality_gate() {
        let template = WarmingTemplate::synthesize("Acme", "Software Engineer", 0);
        let content = TemplateContentSource.content_for(&template).await.unwrap();

        let meta = EntryMetadata::new("q", "openai", "gpt-4o")
            .with_company("Acme")
            .with_skills(template.skills.clone());

        assert!(crate::domain::semantic_cache::quality_score(&content, &meta) >= 0.7);
    }

    #[tokio::test]
    async fn test_warm_stores_every_template() {
        let (cache, store) = orchestrator(settings());
        let warmer = CacheWarmer::new(
            cache.clone(),
            Arc::new(MockEmbeddingProvider::new(4)),
            "openai",
            "gpt-4o",
        );

        let stats = warmer
            .warm(&strings(&["Acme", "Globex"]), &strings(&["Software Engineer"]))
            .await
            .unwrap();

        assert!(!stats.skipped);
        assert_eq!(stats.templates_processed, 6);
        assert_eq!(stats.warmed_entries, 6);
        assert_eq!(stats.failed_entries, 0);
        assert_eq!(store.count().await.unwrap(), 6);
        assert_eq!(cache.stats().ann_entries, 6);
    }

    #[tokio::test]
    async fn test_warmed_entry_serves_lookup() {
        let (cache, _) = orchestrator(settings());
        let embeddings = Arc::new(MockEmbeddingProvider::new(4));
        let warmer = CacheWarmer::new(cache.clone(), embeddings.clone(), "openai", "gpt-4o");

        warmer
            .warm(&strings(&["Acme"]), &strings(&["Data Scientist"]))
            .await
            .unwrap();

        let template = WarmingTemplate::synthesize("Acme", "Data Scientist", 0);
        let embedding = embeddings.embed(&template.query_text).await.unwrap();

        let hit = cache
            .lookup(
                &template.query_text,
                &embedding,
                "openai",
                "gpt-4o",
                &LookupContext::new("Acme", "Data Scientist"),
            )
            .await
            .unwrap()
            .unwrap();

        assert!(hit.content.contains("Data Scientist position at Acme"));
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_fatal() {
        let mut settings = settings().with_min_quality_score(0.85);
        settings.warming_templates_per_partition = 2;
        let (cache, _) = orchestrator(settings);

        let embeddings = Arc::new(MockEmbeddingProvider::new(4));
        embeddings.fail_on("Globex");

        let mut content = MockWarmingContentSource::new();
        content
            .expect_content_for()
            .returning(|t| match t.role.as_str() {
                "Designer" => Ok("too short".to_string()),
                _ => Ok(format!(
                    "A letter for {} mentioning Acme and {}",
                    t.role,
                    t.skills.join(" ")
                )),
            });

        let warmer = CacheWarmer::new(cache, embeddings, "openai", "gpt-4o")
            .with_content_source(Arc::new(content));

        // Each batch of two holds one partition; Globex batches fail to embed
        let stats = warmer
            .warm(
                &strings(&["Acme", "Globex"]),
                &strings(&["Software Engineer", "Designer"]),
            )
            .await
            .unwrap();

        assert_eq!(stats.templates_processed, 8);
        assert_eq!(stats.failed_entries, 4);
        assert_eq!(stats.rejected_entries, 2);
        assert_eq!(stats.warmed_entries, 2);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_fails_entries() {
        let (cache, store) = orchestrator(settings());
        let warmer = CacheWarmer::new(
            cache,
            Arc::new(MockEmbeddingProvider::new(8)),
            "openai",
            "gpt-4o",
        );

        let stats = warmer
            .warm(&strings(&["Acme"]), &strings(&["Software Engineer"]))
            .await
            .unwrap();

        assert_eq!(stats.failed_entries, 3);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disabled_warming_is_skipped() {
        let (cache, _) = orchestrator(settings().with_warming_enabled(false));
        let warmer = CacheWarmer::new(
            cache,
            Arc::new(MockEmbeddingProvider::new(4)),
            "openai",
            "gpt-4o",
        );

        let stats = warmer
            .warm(&strings(&["Acme"]), &strings(&["Engineer"]))
            .await
            .unwrap();
        assert!(stats.skipped);
        assert_eq!(stats.templates_processed, 0);

        let preload = warmer.preload(&UsageAnalytics::default(), 10).await.unwrap();
        assert!(preload.skipped);
    }

    #[test]
    fn test_popularity_weights_and_recency() {
        let mut analytics = UsageAnalytics {
            top_companies: strings(&["Acme", "Globex"]),
            top_roles: strings(&["Engineer"]),
            ..Default::default()
        };
        analytics.company_frequencies.insert("Acme".into(), 10.0);
        analytics.role_frequencies.insert("Engineer".into(), 20.0);
        analytics
            .company_role_frequencies
            .insert("Acme:Engineer".into(), 5.0);
        analytics.company_frequencies.insert("Globex".into(), 30.0);
        analytics
            .recency_multipliers
            .insert("Globex:Engineer".into(), 0.5);

        // 3 + 6 + 2
        assert!((analytics.popularity("Acme", "Engineer") - 11.0).abs() < 1e-9);
        // (9 + 6) * 0.5
        assert!((analytics.popularity("Globex", "Engineer") - 7.5).abs() < 1e-9);

        let ranked = analytics.ranked_patterns();
        assert_eq!(ranked[0].0, "Acme");
        assert_eq!(ranked[1].0, "Globex");
    }

    #[tokio::test]
    async fn test_preload_budget_doubles_at_peak() {
        let (cache, _) = orchestrator(settings().with_max_memory_entries(10));
        let warmer = CacheWarmer::new(
            cache,
            Arc::new(MockEmbeddingProvider::new(4)),
            "openai",
            "gpt-4o",
        );
        let analytics = UsageAnalytics {
            top_companies: strings(&["Acme"]),
            top_roles: strings(&["Engineer"]),
            ..Default::default()
        };

        let peak = warmer.preload(&analytics, 10).await.unwrap();
        assert!(peak.is_peak_time);
        assert_eq!(peak.budget, 6);

        let off_peak = warmer.preload(&analytics, 22).await.unwrap();
        assert!(!off_peak.is_peak_time);
        assert_eq!(off_peak.budget, 3);
        assert_eq!(off_peak.patterns_analyzed, 1);
    }

    #[tokio::test]
    async fn test_preload_places_stored_entry_under_hot_key() {
        let (writer, store) = orchestrator(settings());
        let letter = "Dear Acme, I am a Rust engineer with Python, JavaScript and React experience.";
        writer
            .store(
                letter,
                &normalize(&[1.0, 0.0, 0.0, 0.0]),
                EntryMetadata::new("original jd", "openai", "gpt-4o")
                    .with_company("Acme")
                    .with_role("Software Engineer"),
            )
            .await
            .unwrap();

        // A second process sharing the vector store but not the memory tier
        let content = Arc::new(MockCache::new());
        content
            .set_raw(
                &EntryMetadata::new("original jd", "openai", "gpt-4o")
                    .with_company("Acme")
                    .with_role("Software Engineer")
                    .identity_key(),
                letter,
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        let reader = Arc::new(
            CacheOrchestrator::new(settings(), store, content).unwrap(),
        );

        let embeddings = Arc::new(MockEmbeddingProvider::new(4));
        embeddings.set_embedding(
            "Software Engineer position at Acme",
            normalize(&[0.9, 0.1, 0.0, 0.0]),
        );
        let warmer = CacheWarmer::new(reader.clone(), embeddings, "openai", "gpt-4o");

        let analytics = UsageAnalytics {
            top_companies: strings(&["Acme"]),
            top_roles: strings(&["Software Engineer"]),
            ..Default::default()
        };

        let stats = warmer.preload(&analytics, 3).await.unwrap();
        assert_eq!(stats.preloaded, 1);
        assert_eq!(reader.stats().memory_entries, 1);

        let again = warmer.preload(&analytics, 3).await.unwrap();
        assert_eq!(again.preloaded, 0);
    }
}
