use clap::Parser;
use semantic_result_cache::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::CheckConfig => cli::check_config::run().await,
        Command::Warm(args) => cli::warm::run(args).await,
        Command::Cleanup(args) => cli::cleanup::run(args).await,
    }
}
