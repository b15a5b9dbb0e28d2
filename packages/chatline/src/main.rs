use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::info;
use tracing_subscriber::prelude::*;

mod cli;
mod config;
mod connection;
mod health;
mod session;
mod upload;
mod view;

use crate::config::{ChatlineConfig, Settings};

#[derive(Parser)]
#[command(name = "chatline")]
#[command(about = "Terminal client for a streaming conversational backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Custom data directory (defaults to ~/.chatline)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Backend base URL (overrides config.toml and CHATLINE_SERVER__BASE_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Chat,

    /// Print the session identifier
    Session,

    /// Upload files to the backend
    Upload(UploadArgs),

    /// Check backend health
    Health(HealthArgs),
}

#[derive(Parser)]
struct UploadArgs {
    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[derive(Parser)]
struct HealthArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ChatlineConfig::new(cli.data_dir.clone())?;

    // The chat screen owns the terminal, so its logs go to a file.
    let interactive = matches!(cli.command, None | Some(Commands::Chat));
    let log_file = interactive.then(|| config.chat_log_path());
    init_logging(cli.debug, log_file.as_deref())?;
    info!("Data directory: {}", config.data_dir.display());

    let settings = Settings::resolve(&config, cli.server.as_deref())?;

    match cli.command {
        None | Some(Commands::Chat) => cli::chat_command(&config, &settings).await,
        Some(Commands::Session) => cli::session_command(&config),
        Some(Commands::Upload(args)) => cli::upload_command(&config, &settings, &args.files).await,
        Some(Commands::Health(args)) => cli::health_command(&settings, args.json).await,
    }
}

fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let default_directive = if debug {
        "chatline=debug,chat_protocol=debug,info"
    } else {
        "chatline=info,chat_protocol=info,warn"
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .with(env_filter)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(env_filter)
                .init();
        }
    }
    Ok(())
}
