//! Warm command - precomputes cache entries for popular partitions

use std::sync::Arc;

use clap::Args;
use tracing::info;

use crate::infrastructure::embedding::DEFAULT_EMBEDDING_MODEL;
use crate::infrastructure::services::CacheWarmer;

#[derive(Debug, Args)]
pub struct WarmArgs {
    /// Comma-separated company names
    #[arg(long, value_delimiter = ',', required = true)]
    pub companies: Vec<String>,

    /// Comma-separated role titles
    #[arg(long, value_delimiter = ',', required = true)]
    pub roles: Vec<String>,

    /// Provider recorded on warmed entries
    #[arg(long, default_value = "openai")]
    pub provider: String,

    /// Model recorded on warmed entries
    #[arg(long, default_value = "gpt-4o")]
    pub model: String,
}

pub async fn run(args: WarmArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    let cache = Arc::new(crate::create_cache(&config).await?);
    let embeddings = crate::create_embedding_provider(&config)?;

    info!(
        embedding_model = config
            .backends
            .embedding_model
            .as_deref()
            .unwrap_or(DEFAULT_EMBEDDING_MODEL),
        "Warming cache"
    );

    let warmer = CacheWarmer::new(cache.clone(), embeddings, args.provider, args.model);
    let stats = warmer.warm(&args.companies, &args.roles).await?;

    cache.shutdown().await;

    println!("{}", serde_json::to_string_pretty(&stats)?);

    Ok(())
}
