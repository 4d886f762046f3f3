//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod extract;
mod schemas;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use litigation_tracker::config::Config;

#[derive(Parser)]
#[command(name = "lit-tracker")]
#[command(about = "Extract GST litigation notice details into a tracker sheet")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Extract notice fields from documents and write a tracker file
    Extract(extract::ExtractArgs),

    /// List available schema versions and their fields
    Schemas,

    /// Check external tools, LLM settings and configuration
    Check,
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    if let Some(ref path) = config.source_path {
        tracing::info!("Using config file {}", path.display());
    }

    match cli.command {
        Commands::Extract(args) => extract::cmd_extract(config, args).await,
        Commands::Schemas => schemas::cmd_schemas(&config),
        Commands::Check => check::cmd_check(&config).await,
    }
}
