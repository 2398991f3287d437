// Barista assistant
// Main entry point for the barista binary

use clap::Parser;
use barista_engine::cli::{Cli, Command, OutletAction};
use barista_engine::config::Config;
use barista_engine::handlers::{
    handle_ask, handle_chat, handle_doctor, handle_outlets_nearest, handle_outlets_query,
    OutputFormat,
};
use barista_engine::telemetry::init_telemetry_with_level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Text
    };

    let config = if let Some(config_path) = &cli.config {
        Config::load_from_path(config_path)?
    } else {
        Config::load_or_create()?
    };

    // --log wins over the config file; RUST_LOG wins over both
    let level = cli.log.as_deref().unwrap_or(&config.core.log_level);
    init_telemetry_with_level(level);

    tracing::info!(
        "Barista v{} ({} - {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_COMMIT_HASH"),
        env!("BUILD_TIMESTAMP")
    );

    match cli.command {
        Command::Chat { session, lat, lon } => handle_chat(session, lat, lon, &config, format).await,

        Command::Ask { message, lat, lon } => handle_ask(message, lat, lon, &config, format).await,

        Command::Outlets { action } => {
            tracing::debug!("Outlet catalogue: {:?}", action);
            match action {
                OutletAction::Query { text } => handle_outlets_query(text, &config, format).await,
                OutletAction::Nearest { lat, lon, limit } => {
                    handle_outlets_nearest(lat, lon, limit, &config, format).await
                }
            }
        }

        Command::Doctor => {
            tracing::info!("Running diagnostics...");
            handle_doctor(&config, format).await
        }
    }
}
