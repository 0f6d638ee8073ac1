//! Check-config command - validates and prints the effective configuration

use tracing::info;

/// Validate configuration and print it as pretty JSON
pub async fn run() -> anyhow::Result<()> {
    let config = super::bootstrap()?;

    config.validate()?;
    info!("Configuration is valid");

    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}
