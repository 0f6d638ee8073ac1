use serde::{Deserialize, Serialize};

use crate::domain::semantic_cache::CacheSettings;
use crate::domain::CacheError;

const ENV_PREFIX: &str = "SEMCACHE";

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub backends: BackendSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Connection settings for the durable tiers
///
/// A missing URL selects the in-process backend for that tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub redis_url: Option<String>,
    #[serde(default = "default_redis_key_prefix")]
    pub redis_key_prefix: String,
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default = "default_vector_table")]
    pub vector_table: String,
    #[serde(default = "default_postgres_max_connections")]
    pub postgres_max_connections: u32,
    /// Base URL of the OpenAI-compatible embeddings endpoint
    #[serde(default)]
    pub embedding_base_url: Option<String>,
    #[serde(default)]
    pub embedding_api_key: Option<String>,
    #[serde(default)]
    pub embedding_model: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_redis_key_prefix() -> String {
    String::new()
}

fn default_vector_table() -> String {
    "semantic_cache_entries".to_string()
}

fn default_postgres_max_connections() -> u32 {
    10
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            redis_key_prefix: default_redis_key_prefix(),
            postgres_url: None,
            vector_table: default_vector_table(),
            postgres_max_connections: default_postgres_max_connections(),
            embedding_base_url: None,
            embedding_api_key: None,
            embedding_model: None,
        }
    }
}

impl AppConfig {
    /// Layer `config/default`, `config/local` and `SEMCACHE__*` variables
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(config::Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from(environment: config::Environment) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                environment
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        self.cache.validate()?;

        if self.backends.vector_table.is_empty() {
            return Err(CacheError::configuration("backends.vector_table must not be empty"));
        }

        if self.backends.postgres_max_connections == 0 {
            return Err(CacheError::configuration(
                "backends.postgres_max_connections must be greater than zero",
            ));
        }

        Ok(())
    }
}
