//! Command-line interface.
//!
//! Running without a subcommand opens the interactive menu.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod backup;
pub mod history;
pub mod menu;

/// Full and incremental snapshots of a directory tree
#[derive(Parser, Debug)]
#[command(name = "backup")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Copy the whole source tree into a new snapshot
    Full(BackupArgs),
    /// Snapshot only what changed since the latest snapshot
    Incremental(BackupArgs),
    /// Show the backups recorded in a backup root
    History(history::HistoryArgs),
    /// Interactive menu (default)
    Menu,
}

/// Source and destination of a backup run
#[derive(Args, Debug, Clone)]
pub struct BackupArgs {
    /// Directory to back up
    #[arg(short, long, value_name = "DIR")]
    pub source: PathBuf,

    /// Directory holding the snapshots
    #[arg(short, long, value_name = "DIR")]
    pub backup_root: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let cli = Cli::try_parse_from([
            "backup",
            "full",
            "--source",
            "/data",
            "--backup-root",
            "/backups",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Full(args)) => {
                assert_eq!(args.source, PathBuf::from("/data"));
                assert_eq!(args.backup_root, PathBuf::from("/backups"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_incremental_short_flags_and_globals() {
        let cli = Cli::try_parse_from([
            "backup",
            "incremental",
            "-s",
            "src",
            "-b",
            "dst",
            "--log-level",
            "debug",
            "-c",
            "backup.toml",
        ])
        .unwrap();
        assert!(matches!(cli.command, Some(Commands::Incremental(_))));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.config, Some(PathBuf::from("backup.toml")));
    }

    #[test]
    fn test_parse_history_json() {
        let cli =
            Cli::try_parse_from(["backup", "history", "--backup-root", "/backups", "--json"])
                .unwrap();
        match cli.command {
            Some(Commands::History(args)) => {
                assert!(args.json);
                assert_eq!(args.backup_root, PathBuf::from("/backups"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_no_subcommand_means_menu() {
        let cli = Cli::try_parse_from(["backup"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_backup_requires_both_paths() {
        assert!(Cli::try_parse_from(["backup", "full", "--source", "/data"]).is_err());
    }
}
