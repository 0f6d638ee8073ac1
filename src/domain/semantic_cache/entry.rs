//! Cache entry and the metadata supplied with each write

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::{content_hash, identity_key, Partition};

/// Request and generation metadata accompanying a stored result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// The request text the content was generated for
    pub query_text: String,
    pub company: String,
    pub role: String,
    /// Extracted keywords, informational only
    #[serde(default)]
    pub skills: Vec<String>,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub token_count: u32,
    #[serde(default)]
    pub cost: f64,
}

impl EntryMetadata {
    pub fn new(
        query_text: impl Into<String>,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            query_text: query_text.into(),
            provider: provider.into(),
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = company.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_usage(mut self, token_count: u32, cost: f64) -> Self {
        self.token_count = token_count;
        self.cost = cost;
        self
    }

    pub fn partition(&self) -> Partition {
        Partition::new(&self.company, &self.role)
    }

    /// Deterministic identity key for this request
    pub fn identity_key(&self) -> String {
        let hash = content_hash(&self.query_text, &self.provider, &self.model);
        identity_key(&self.partition(), &hash)
    }
}

/// The cached unit
///
/// `content` is only held inline by the memory tier; vector tiers return
/// entries without it and the orchestrator resolves it from the content store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    key: String,
    content: Option<String>,
    embedding: Vec<f32>,
    metadata: EntryMetadata,
    partition: Partition,
    quality_score: f64,
    hit_count: u64,
    created_at: DateTime<Utc>,
    last_accessed_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry keyed by the metadata's identity key
    pub fn new(
        content: impl Into<String>,
        embedding: Vec<f32>,
        metadata: EntryMetadata,
        quality_score: f64,
    ) -> Self {
        let now = Utc::now();

        Self {
            key: metadata.identity_key(),
            content: Some(content.into()),
            embedding,
            partition: metadata.partition(),
            metadata,
            quality_score,
            hit_count: 0,
            created_at: now,
            last_accessed_at: now,
        }
    }

    /// Rebuild an entry read back from a vector tier
    pub fn restored(
        key: impl Into<String>,
        embedding: Vec<f32>,
        metadata: EntryMetadata,
        quality_score: f64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            content: None,
            embedding,
            partition: metadata.partition(),
            metadata,
            quality_score,
            hit_count: 0,
            created_at,
            last_accessed_at: created_at,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Copy of this entry with the content payload dropped
    pub fn without_content(&self) -> Self {
        Self {
            content: None,
            ..self.clone()
        }
    }

    pub fn with_hit_count(mut self, hit_count: u64) -> Self {
        self.hit_count = hit_count;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn with_last_accessed_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_accessed_at = at;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn metadata(&self) -> &EntryMetadata {
        &self.metadata
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn provider(&self) -> &str {
        &self.metadata.provider
    }

    pub fn model(&self) -> &str {
        &self.metadata.model
    }

    pub fn quality_score(&self) -> f64 {
        self.quality_score
    }

    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_accessed_at(&self) -> DateTime<Utc> {
        self.last_accessed_at
    }

    /// Bump hit bookkeeping
    pub fn record_hit(&mut self, at: DateTime<Utc>) {
        self.hit_count += 1;
        self.last_accessed_at = at;
    }

    /// Whether `created_at + ttl` lies before `now`
    pub fn is_expired_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        expired_at(self.created_at, ttl, now)
    }
}

/// Whether `created_at + ttl` lies before `now`
///
/// A lifetime that overflows the timestamp range never expires.
pub fn expired_at(created_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| created_at.checked_add_signed(ttl))
        .is_some_and(|deadline| deadline < now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> EntryMetadata {
        EntryMetadata::new("Acme is hiring", "openai", "gpt-4o")
            .with_company("Acme")
            .with_role("Software Engineer")
            .with_skills(["Rust", "SQL"])
            .with_usage(150, 0.01)
    }

    #[test]
    fn test_identity_key_is_reproducible() {
        let a = CacheEntry::new("letter", vec![1.0], metadata(), 0.9);
        let b = CacheEntry::new("other letter", vec![0.0, 1.0], metadata(), 0.8);

        assert_eq!(a.key(), b.key());
        assert!(a.key().starts_with("semantic_cache:acme:software_engineer:"));
    }

    #[test]
    fn test_identity_key_depends_on_model() {
        let other = EntryMetadata {
            model: "gpt-4o-mini".to_string(),
            ..metadata()
        };

        assert_ne!(metadata().identity_key(), other.identity_key());
    }

    #[test]
    fn test_without_content() {
        let entry = CacheEntry::new("letter", vec![1.0], metadata(), 0.9);
        let stripped = entry.without_content();

        assert_eq!(entry.content(), Some("letter"));
        assert!(stripped.content().is_none());
        assert_eq!(stripped.key(), entry.key());
    }

    #[test]
    fn test_record_hit() {
        let mut entry = CacheEntry::new("letter", vec![1.0], metadata(), 0.9);
        let later = entry.created_at() + chrono::Duration::seconds(5);

        entry.record_hit(later);

        assert_eq!(entry.hit_count(), 1);
        assert_eq!(entry.last_accessed_at(), later);
    }

    #[test]
    fn test_expiry() {
        let entry = CacheEntry::new("letter", vec![1.0], metadata(), 0.9);
        let created = entry.created_at();

        assert!(!entry.is_expired_at(Duration::from_secs(60), created));
        assert!(entry.is_expired_at(
            Duration::from_secs(60),
            created + chrono::Duration::seconds(61)
        ));
    }

    #[test]
    fn test_overflowing_ttl_never_expires() {
        let entry = CacheEntry::new("letter", vec![1.0], metadata(), 0.9);
        let ttl = Duration::from_secs(10_000_000_000_000);

        assert!(!entry.is_expired_at(ttl, entry.created_at()));
        assert!(!entry.is_expired_at(Duration::MAX, Utc::now()));
    }
}
