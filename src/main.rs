//! Docent CLI entry point.

use anyhow::Result;
use clap::Parser;
use docent::cli::{commands, Cli, Commands};
use docent::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("docent={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load configuration
    let config_path = cli
        .config
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(Settings::default_config_path);
    let settings = Settings::load_from(Some(&config_path))?;

    // Execute command
    match &cli.command {
        Commands::Serve { host, port } => {
            std::fs::create_dir_all(settings.data_dir())?;
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Chat => {
            std::fs::create_dir_all(settings.data_dir())?;
            commands::run_chat(settings).await?;
        }

        Commands::Ask { question, session } => {
            std::fs::create_dir_all(settings.data_dir())?;
            commands::run_ask(question, session.clone(), settings).await?;
        }

        Commands::Index { rebuild } => {
            std::fs::create_dir_all(settings.data_dir())?;
            commands::run_index(*rebuild, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, config_path, settings)?;
        }
    }

    Ok(())
}
