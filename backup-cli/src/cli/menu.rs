//! Interactive text menu.
//!
//! History shown here is the history of this session. Ctrl+C or end of
//! input leaves the menu.

use super::backup::{self, BackupMode, Summary};
use super::history::HistoryView;
use super::BackupArgs;
use anyhow::Result;
use backup_engine::{BackupEngine, SnapshotLedger};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Full,
    Incremental,
    History,
    Exit,
}

impl MenuChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "1" => Some(MenuChoice::Full),
            "2" => Some(MenuChoice::Incremental),
            "3" => Some(MenuChoice::History),
            "4" => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}

/// Run the menu on stdin until the user exits
pub async fn run(engine: Arc<BackupEngine>) -> Result<()> {
    let lines = BufReader::new(tokio::io::stdin()).lines();
    run_with(engine, lines).await
}

async fn run_with<R>(engine: Arc<BackupEngine>, mut lines: Lines<R>) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let ledger = Arc::new(Mutex::new(SnapshotLedger::new()));

    loop {
        print_menu();
        let Some(input) = prompt(&mut lines, "Enter your choice: ").await? else {
            break;
        };

        let mode = match MenuChoice::parse(&input) {
            Some(MenuChoice::Full) => BackupMode::Full,
            Some(MenuChoice::Incremental) => BackupMode::Incremental,
            Some(MenuChoice::History) => {
                let ledger = ledger.lock().unwrap_or_else(PoisonError::into_inner);
                print!("{}", HistoryView(ledger.list()));
                continue;
            }
            Some(MenuChoice::Exit) => break,
            None => {
                println!("Invalid choice. Please try again.");
                continue;
            }
        };

        let Some(source) = prompt(&mut lines, "Enter source directory path: ").await? else {
            break;
        };
        let Some(backup_root) = prompt(&mut lines, "Enter backup directory path: ").await? else {
            break;
        };
        let args = BackupArgs {
            source: PathBuf::from(source),
            backup_root: PathBuf::from(backup_root),
        };

        match backup::execute(engine.clone(), ledger.clone(), mode, args).await {
            Ok(outcome) => print!("{}", Summary(&outcome)),
            Err(e) => {
                error!(error = %e, "Backup failed");
                println!("Backup failed: {e:#}");
            }
        }
    }

    println!("Exiting...");
    Ok(())
}

fn print_menu() {
    println!();
    println!("Backup Menu:");
    println!("1. Full Backup");
    println!("2. Incremental Backup");
    println!("3. View Backup History");
    println!("4. Exit");
}

/// Read one trimmed line, or `None` on end of input or Ctrl+C
async fn prompt<R>(lines: &mut Lines<R>, label: &str) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    print!("{label}");
    std::io::stdout().flush()?;

    tokio::select! {
        line = lines.next_line() => Ok(line?.map(|l| l.trim().to_string())),
        _ = tokio::signal::ctrl_c() => {
            println!();
            info!("Received Ctrl+C, leaving menu");
            Ok(None)
        }
    }
}
