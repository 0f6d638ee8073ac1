//! CLI module for the semantic result cache
//!
//! Maintenance subcommands operating on the configured backends:
//! - `check-config`: validate and print the effective configuration
//! - `warm`: precompute entries for popular companies and roles
//! - `cleanup`: purge old entries from the persistent vector store

pub mod check_config;
pub mod cleanup;
pub mod warm;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Semantic Result Cache - maintenance tooling for the multi-tier cache
#[derive(Parser)]
#[command(name = "semantic-result-cache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load and validate configuration, then print it as JSON
    CheckConfig,

    /// Warm the cache for popular companies and roles
    Warm(warm::WarmArgs),

    /// Delete persistent entries older than a given age
    Cleanup(cleanup::CleanupArgs),
}

/// Load configuration and install logging
fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    Ok(config)
}
