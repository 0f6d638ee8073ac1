//! Cleanup command - purges old entries from the persistent vector store

use std::time::Duration;

use clap::Args;
use tracing::info;

const SECONDS_PER_DAY: u64 = 24 * 3600;

#[derive(Debug, Args)]
pub struct CleanupArgs {
    /// Entries created more than this many days ago are deleted
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub max_age_days: u64,
}

pub async fn run(args: CleanupArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let cache = crate::create_cache(&config).await?;

    let max_age = Duration::from_secs(args.max_age_days * SECONDS_PER_DAY);
    let removed = cache.purge_older_than(max_age).await?;

    info!(removed, max_age_days = args.max_age_days, "Cleanup complete");
    println!("{}", removed);

    Ok(())
}
