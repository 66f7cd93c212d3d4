//! Backup history.
//!
//! The ledger keeps completed runs in insertion order for display. Each record
//! is also appended to two files in its backup root:
//!
//! - `backup_history.txt`: one human-readable line per run, never parsed back
//! - `backup_history.jsonl`: one JSON object per run, reloaded by [`SnapshotLedger::open`]
//!
//! Files are opened, appended and closed per record, so a crash can only lose
//! the record being written.

use crate::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Human-readable history log, one line per run
pub const HISTORY_FILE: &str = "backup_history.txt";

/// Machine-readable history journal, one JSON record per line
pub const JOURNAL_FILE: &str = "backup_history.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupKind {
    Full,
    Incremental,
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupKind::Full => f.write_str("full"),
            BackupKind::Incremental => f.write_str("incremental"),
        }
    }
}

/// Summary of one completed backup run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    /// `YYYYMMDD_HHMMSS`, also the snapshot directory suffix
    pub timestamp: String,
    pub kind: BackupKind,
    pub source_root: PathBuf,
    pub snapshot_path: PathBuf,
    pub total_source_files: usize,
    /// Files whose bytes were written: source copies plus link fallbacks
    pub files_written: usize,
    #[serde(default)]
    pub files_linked: usize,
    /// Directory name of the snapshot an incremental run was based on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub based_on: Option<String>,
}

impl SnapshotRecord {
    pub fn is_incremental(&self) -> bool {
        self.kind == BackupKind::Incremental
    }

    /// Backup root the snapshot lives in
    pub fn backup_root(&self) -> Option<&Path> {
        self.snapshot_path.parent()
    }

    /// Single history-log line for this run
    pub fn log_line(&self) -> String {
        let lineage = match &self.based_on {
            Some(base) => format!(" based on {base}"),
            None => String::new(),
        };
        format!(
            "{}: {} backup of {}{} ({}/{} files) -> {}",
            self.timestamp,
            self.kind,
            self.source_root.display(),
            lineage,
            self.files_written,
            self.total_source_files,
            self.snapshot_path.display()
        )
    }
}

impl fmt::Display for SnapshotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Time:     {}", self.timestamp)?;
        writeln!(f, "Type:     {} backup", self.kind)?;
        if let Some(base) = &self.based_on {
            writeln!(f, "Based on: {base}")?;
        }
        writeln!(f, "Source:   {}", self.source_root.display())?;
        writeln!(f, "Location: {}", self.snapshot_path.display())?;
        write!(f, "Files:    {}/{}", self.files_written, self.total_source_files)?;
        if self.files_linked > 0 {
            write!(f, " ({} linked)", self.files_linked)?;
        }
        Ok(())
    }
}

/// Ordered record of completed runs
#[derive(Debug, Default)]
pub struct SnapshotLedger {
    records: Vec<SnapshotRecord>,
}

impl SnapshotLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger pre-populated from the journal in `backup_root`.
    ///
    /// A missing journal yields an empty ledger. Malformed lines are skipped.
    pub fn open(backup_root: &Path) -> Result<Self> {
        let path = backup_root.join(JOURNAL_FILE);
        if !path.exists() {
            return Ok(Self::new());
        }

        let history_error = |source| BackupError::History {
            path: path.clone(),
            source,
        };
        let reader = BufReader::new(File::open(&path).map_err(history_error)?);

        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(history_error)?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<SnapshotRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    path = %path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping malformed history entry"
                ),
            }
        }

        debug!(path = %path.display(), records = records.len(), "Loaded backup history");
        Ok(Self { records })
    }

    /// Append a record in memory and to its backup root's history files.
    ///
    /// The in-memory append always happens, and both files are attempted even
    /// when one of them fails. The first failure is returned. A record whose
    /// paths are not valid UTF-8 reaches the text log but not the journal.
    pub fn record(&mut self, record: SnapshotRecord) -> Result<()> {
        let backup_root = record.backup_root().map(Path::to_path_buf);
        let line = record.log_line();
        let json = serde_json::to_string(&record).map_err(BackupError::from);
        self.records.push(record);

        let Some(root) = backup_root else {
            return Ok(());
        };
        let text = append_line(&root.join(HISTORY_FILE), &line);
        let journal = json.and_then(|json| append_line(&root.join(JOURNAL_FILE), &json));
        text.and(journal)
    }

    /// Records in insertion order, most recent last
    pub fn list(&self) -> &[SnapshotRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let history_error = |source| BackupError::History {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(history_error)?;
    writeln!(file, "{line}").map_err(history_error)?;
    Ok(())
}
