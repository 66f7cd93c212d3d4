//! History command.

use anyhow::{Context, Result};
use backup_engine::{SnapshotLedger, SnapshotRecord};
use clap::Args;
use std::fmt;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Directory holding the snapshots
    #[arg(short, long, value_name = "DIR")]
    pub backup_root: PathBuf,

    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
}

/// Print the history journal of a backup root
pub fn run(args: &HistoryArgs) -> Result<()> {
    let ledger = SnapshotLedger::open(&args.backup_root).with_context(|| {
        format!("Failed to read backup history in {}", args.backup_root.display())
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(ledger.list())?);
    } else {
        print!("{}", HistoryView(ledger.list()));
    }

    Ok(())
}

/// Numbered listing of history records, oldest first
pub struct HistoryView<'a>(pub &'a [SnapshotRecord]);

impl fmt::Display for HistoryView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "No backups have been performed yet.");
        }

        writeln!(f, "Backup History:")?;
        for (index, record) in self.0.iter().enumerate() {
            writeln!(f)?;
            writeln!(f, "#{}", index + 1)?;
            writeln!(f, "{record}")?;
        }
        Ok(())
    }
}
