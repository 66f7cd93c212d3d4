//! Backup - command-line entry point.
//!
//! Full and incremental snapshots of a directory tree, from subcommands or
//! the interactive menu.

mod cli;

use anyhow::{Context, Result};
use backup_engine::{utils, BackupEngine, Config};
use clap::Parser;
use cli::backup::{self, BackupMode};
use cli::{history, menu, Cli, Commands};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::default(),
    };

    // Initialize logging
    let log_level = cli.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    let engine = Arc::new(BackupEngine::new(config));
    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        link_mode = ?engine.config().snapshot.link_mode,
        buffer_size = engine.config().snapshot.buffer_size,
        "Starting backup"
    );

    match cli.command.unwrap_or(Commands::Menu) {
        Commands::Full(args) => backup::run(engine, BackupMode::Full, args).await,
        Commands::Incremental(args) => backup::run(engine, BackupMode::Incremental, args).await,
        Commands::History(args) => history::run(&args),
        Commands::Menu => menu::run(engine).await,
    }
}
