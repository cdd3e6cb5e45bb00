// CDM provider control tool
// Main entry point for the cdmctl binary

use clap::Parser;
use cdm_engine::cli::Cli;
use cdm_engine::config::Config;
use cdm_engine::handlers::{dispatch, effective_log_level, OutputFormat};
use cdm_engine::telemetry::{init_telemetry, init_telemetry_with_level};
use sdk::errors::{ProviderError, ProviderErrorExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize basic telemetry first (before config is loaded)
    init_telemetry();

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::debug!("cdmctl v{} ({} - {})", version, commit, timestamp);

    // Determine output format
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    // Load configuration (or use custom path if provided)
    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // Re-initialize telemetry with the config-driven or --log level
    // (only takes effect if RUST_LOG env var is not set)
    let log_level = effective_log_level(cli.log.as_deref(), &config);
    init_telemetry_with_level(log_level);

    tracing::debug!("Running {:?}", cli.command);

    if let Err(e) = dispatch(cli.command, &config, log_level, format).await {
        if let Some(provider_error) = e.downcast_ref::<ProviderError>() {
            eprintln!("hint: {}", provider_error.user_hint());
        }
        return Err(e);
    }

    Ok(())
}
