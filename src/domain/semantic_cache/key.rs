//! Partition and identity key construction

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix shared by every identity key
pub const IDENTITY_PREFIX: &str = "semantic_cache:";

/// Prefix of memory-tier partition hot keys
pub const HOT_PREFIX: &str = "hot:";

const UNKNOWN: &str = "unknown";

/// Case-normalized `(company, role)` grouping
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Partition {
    company: String,
    role: String,
}

impl Partition {
    pub fn new(company: &str, role: &str) -> Self {
        Self {
            company: normalize_component(company),
            role: normalize_component(role),
        }
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    /// `{company}:{role}`
    pub fn key(&self) -> String {
        format!("{}:{}", self.company, self.role)
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.company, self.role)
    }
}

fn normalize_component(value: &str) -> String {
    let trimmed = value.trim();

    if trimmed.is_empty() {
        return UNKNOWN.to_string();
    }

    trimmed.to_lowercase().replace([' ', '-'], "_")
}

/// First 16 hex chars of SHA-256 over `{query_text}:{provider}:{model}`
pub fn content_hash(query_text: &str, provider: &str, model: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", query_text, provider, model).as_bytes());
    let digest = hex::encode(hasher.finalize());

    digest[..16].to_string()
}

/// `semantic_cache:{partition}:{content_hash}`
pub fn identity_key(partition: &Partition, content_hash: &str) -> String {
    format!("{}{}:{}", IDENTITY_PREFIX, partition, content_hash)
}

/// `hot:{partition}:{provider}:{model}`
pub fn hot_key(partition: &Partition, provider: &str, model: &str) -> String {
    format!("{}{}:{}:{}", HOT_PREFIX, partition, provider, model)
}
