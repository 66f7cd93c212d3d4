//! Backup executor - runs one full or incremental backup end to end.
//!
//! A run moves through `Idle -> Scanning -> Diffing -> Materializing -> Recorded`.
//! Diffing only happens for incremental runs that find a prior snapshot.
//! An incremental run without a prior snapshot is performed as a full backup,
//! and one with nothing new or modified ends as [`BackupOutcome::NoChanges`]
//! without creating a snapshot directory.

use crate::config::{Config, LinkMode};
use crate::fs::walker::{scan_tree, ScanResult, WalkOptions};
use crate::ledger::{BackupKind, SnapshotLedger, SnapshotRecord, HISTORY_FILE};
use crate::snapshot::{
    format_timestamp, latest_snapshot, materialize, resolve_changes, snapshot_dir_name, ChangeSet,
    CopyOnlyLinker, FileLinker, HardLinker, MaterializeStats,
};
use crate::{BackupError, Diagnostic, DiagnosticKind, Result};
use chrono::NaiveDateTime;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Source of snapshot timestamps
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Stage of a single backup run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Scanning,
    Diffing,
    Materializing,
    Recorded,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Idle => "idle",
            RunPhase::Scanning => "scanning",
            RunPhase::Diffing => "diffing",
            RunPhase::Materializing => "materializing",
            RunPhase::Recorded => "recorded",
        };
        f.write_str(name)
    }
}

/// Everything a completed run produced
#[derive(Debug)]
pub struct BackupReport {
    /// The record appended to the ledger
    pub record: SnapshotRecord,
    pub stats: MaterializeStats,
    /// Prior-snapshot files no longer present in the source
    pub deleted_files: usize,
    /// Scan, materialize and history faults, in the order they occurred
    pub diagnostics: Vec<Diagnostic>,
    pub duration: Duration,
}

impl BackupReport {
    /// Diagnostics that represent a file left out of the snapshot or log
    pub fn failures(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_failure())
    }
}

/// Result of a backup invocation that did not fail outright
#[derive(Debug)]
pub enum BackupOutcome {
    /// A snapshot was written and recorded
    Completed(BackupReport),

    /// Incremental run found nothing new or modified; no snapshot was created
    NoChanges {
        latest_snapshot: PathBuf,
        total_source_files: usize,
    },
}

/// Runs backups of a source tree into a backup root
pub struct BackupEngine {
    config: Config,
    clock: Box<dyn Clock + Send + Sync>,
    linker: Box<dyn FileLinker + Send + Sync>,
}

impl BackupEngine {
    /// Engine using the wall clock and the configured link mode
    pub fn new(config: Config) -> Self {
        let linker: Box<dyn FileLinker + Send + Sync> = match config.snapshot.link_mode {
            LinkMode::Hardlink => Box::new(HardLinker),
            LinkMode::Copy => Box::new(CopyOnlyLinker),
        };

        Self {
            config,
            clock: Box::new(SystemClock),
            linker,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_linker(mut self, linker: impl FileLinker + Send + Sync + 'static) -> Self {
        self.linker = Box::new(linker);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Copy the whole source tree into a new snapshot.
    ///
    /// # Errors
    /// * `MissingSourceRoot` / `SourceNotDirectory` - bad source, nothing created
    /// * `SnapshotExists` - a snapshot with this run's timestamp already exists
    /// * `DestinationWriteFailure` - the snapshot directory cannot be created
    pub fn run_full(
        &self,
        source: &Path,
        backup_root: &Path,
        ledger: &mut SnapshotLedger,
    ) -> Result<BackupOutcome> {
        let started = Instant::now();
        let source_root = check_source(source)?;

        info!(
            source = %source.display(),
            backup_root = %backup_root.display(),
            "Starting full backup"
        );
        let scan = self.scan_source(&source_root, backup_root)?;
        let changes = ChangeSet::full(&scan.inventory);

        let run = PendingRun {
            kind: BackupKind::Full,
            based_on: None,
            source,
            source_root: &source_root,
            backup_root,
            started,
        };
        self.materialize_and_record(run, scan, changes, ledger)
    }

    /// Snapshot only what changed since the latest snapshot in `backup_root`.
    ///
    /// Unchanged files are linked from the prior snapshot. Without a prior
    /// snapshot this is a full backup, recorded as such.
    pub fn run_incremental(
        &self,
        source: &Path,
        backup_root: &Path,
        ledger: &mut SnapshotLedger,
    ) -> Result<BackupOutcome> {
        let started = Instant::now();
        let source_root = check_source(source)?;

        let Some(prior) = latest_snapshot(backup_root)? else {
            info!(
                backup_root = %backup_root.display(),
                "No previous backup found, performing full backup"
            );
            return self.run_full(source, backup_root, ledger);
        };

        info!(
            source = %source.display(),
            based_on = %prior.name,
            "Starting incremental backup"
        );
        let mut scan = self.scan_source(&source_root, backup_root)?;

        info!(snapshot = %prior.path.display(), "Scanning previous backup");
        let prior_scan = scan_tree(&prior.path, &self.walk_options())?;
        scan.diagnostics.extend(prior_scan.diagnostics);

        enter(RunPhase::Diffing);
        let changes = resolve_changes(&scan.inventory, &prior_scan.inventory);
        debug!(
            copy = changes.to_copy.len(),
            copy_bytes = changes.copy_bytes(),
            link = changes.to_link.len(),
            link_bytes = changes.link_bytes(),
            deleted = changes.deleted,
            "Change set resolved"
        );

        if changes.is_noop() {
            info!(based_on = %prior.name, "No changes detected since last backup");
            enter(RunPhase::Idle);
            return Ok(BackupOutcome::NoChanges {
                latest_snapshot: prior.path,
                total_source_files: scan.inventory.len(),
            });
        }

        let run = PendingRun {
            kind: BackupKind::Incremental,
            based_on: Some(prior.name),
            source,
            source_root: &source_root,
            backup_root,
            started,
        };
        self.materialize_and_record(run, scan, changes, ledger)
    }

    fn walk_options(&self) -> WalkOptions {
        WalkOptions::from_config(&self.config.scan, self.config.snapshot.buffer_size)
    }

    /// Scan the source, pruning the backup root when it is nested inside
    fn scan_source(&self, source_root: &Path, backup_root: &Path) -> Result<ScanResult> {
        enter(RunPhase::Scanning);

        let mut options = self.walk_options();
        let backup_root = resolve_absolute(backup_root);
        if backup_root.starts_with(source_root) && backup_root != source_root {
            debug!(backup_root = %backup_root.display(), "Excluding nested backup root from scan");
            options = options.skip_dir(backup_root);
        }

        info!(source = %source_root.display(), "Scanning source directory");
        let scan = scan_tree(source_root, &options)?;
        info!(
            files = scan.inventory.len(),
            bytes = scan.inventory.total_bytes(),
            skipped = scan.diagnostics.len(),
            "Source scan complete"
        );
        Ok(scan)
    }

    fn materialize_and_record(
        &self,
        run: PendingRun<'_>,
        scan: ScanResult,
        changes: ChangeSet,
        ledger: &mut SnapshotLedger,
    ) -> Result<BackupOutcome> {
        let timestamp = format_timestamp(&self.clock.now());
        let destination = run.backup_root.join(snapshot_dir_name(&timestamp));

        enter(RunPhase::Materializing);
        let mut stats = materialize(
            &changes,
            run.source_root,
            &destination,
            self.linker.as_ref(),
            self.config.snapshot.buffer_size,
        )?;

        let record = SnapshotRecord {
            timestamp,
            kind: run.kind,
            source_root: run.source.to_path_buf(),
            snapshot_path: destination,
            total_source_files: scan.inventory.len(),
            files_written: stats.files_written(),
            files_linked: stats.files_linked,
            based_on: run.based_on,
        };

        let mut diagnostics = scan.diagnostics;
        diagnostics.append(&mut stats.diagnostics);

        if let Err(e) = ledger.record(record.clone()) {
            warn!(error = %e, "Failed to append backup history");
            diagnostics.push(e.to_diagnostic().unwrap_or_else(|| {
                Diagnostic::new(
                    run.backup_root.join(HISTORY_FILE),
                    DiagnosticKind::HistoryWrite,
                    &e,
                )
            }));
        }
        enter(RunPhase::Recorded);

        let duration = run.started.elapsed();
        info!(
            kind = %record.kind,
            snapshot = %record.snapshot_path.display(),
            written = record.files_written,
            linked = record.files_linked,
            total = record.total_source_files,
            failed = stats.files_failed,
            elapsed_ms = duration.as_millis() as u64,
            "Backup completed"
        );

        Ok(BackupOutcome::Completed(BackupReport {
            record,
            stats,
            deleted_files: changes.deleted,
            diagnostics,
            duration,
        }))
    }
}

/// Per-run values carried from planning into materialization
struct PendingRun<'a> {
    kind: BackupKind,
    based_on: Option<String>,
    source: &'a Path,
    source_root: &'a Path,
    backup_root: &'a Path,
    started: Instant,
}

fn enter(phase: RunPhase) {
    debug!(%phase, "Backup phase");
}

/// Validate the source root and return its canonical form
fn check_source(source: &Path) -> Result<PathBuf> {
    if !source.exists() {
        return Err(BackupError::MissingSourceRoot(source.to_path_buf()));
    }
    if !source.is_dir() {
        return Err(BackupError::SourceNotDirectory(source.to_path_buf()));
    }
    Ok(fs::canonicalize(source)?)
}

/// Canonical path for `path`, resolving through its nearest existing ancestor
fn resolve_absolute(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) if !parent.as_os_str().is_empty() => {
            resolve_absolute(parent).join(name)
        }
        _ => std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()),
    }
}
