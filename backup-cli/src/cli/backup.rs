//! Full and incremental backup commands.

use super::BackupArgs;
use anyhow::{Context, Result};
use backup_engine::transfer::{format_bytes, format_duration};
use backup_engine::{BackupEngine, BackupOutcome, SnapshotLedger};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupMode {
    Full,
    Incremental,
}

impl fmt::Display for BackupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupMode::Full => f.write_str("full"),
            BackupMode::Incremental => f.write_str("incremental"),
        }
    }
}

/// Run one backup on the blocking pool and record it in `ledger`
pub async fn execute(
    engine: Arc<BackupEngine>,
    ledger: Arc<Mutex<SnapshotLedger>>,
    mode: BackupMode,
    args: BackupArgs,
) -> Result<BackupOutcome> {
    let source = args.source.clone();

    let result = tokio::task::spawn_blocking(move || {
        let mut ledger = ledger.lock().unwrap_or_else(PoisonError::into_inner);
        match mode {
            BackupMode::Full => engine.run_full(&args.source, &args.backup_root, &mut ledger),
            BackupMode::Incremental => {
                engine.run_incremental(&args.source, &args.backup_root, &mut ledger)
            }
        }
    })
    .await
    .context("Backup task failed to complete")?;

    result.with_context(|| format!("{} backup of {} failed", mode, source.display()))
}

/// Run the `full` or `incremental` subcommand
pub async fn run(engine: Arc<BackupEngine>, mode: BackupMode, args: BackupArgs) -> Result<()> {
    println!(
        "Starting {} backup: {} -> {}",
        mode,
        args.source.display(),
        args.backup_root.display()
    );

    let ledger = Arc::new(Mutex::new(SnapshotLedger::new()));
    let outcome = execute(engine, ledger, mode, args).await?;
    print!("{}", Summary(&outcome));

    Ok(())
}

/// Console summary of a backup outcome
pub struct Summary<'a>(pub &'a BackupOutcome);

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = match self.0 {
            BackupOutcome::NoChanges {
                latest_snapshot,
                total_source_files,
            } => {
                return writeln!(
                    f,
                    "No changes detected since {} ({} files checked). No new backup created.",
                    latest_snapshot.display(),
                    total_source_files
                );
            }
            BackupOutcome::Completed(report) => report,
        };
        let record = &report.record;
        let stats = &report.stats;

        writeln!(f, "Backup completed successfully!")?;
        writeln!(f, "  Location:      {}", record.snapshot_path.display())?;
        if let Some(base) = &record.based_on {
            writeln!(f, "  Based on:      {base}")?;
        }
        writeln!(
            f,
            "  Files written: {}/{}",
            record.files_written, record.total_source_files
        )?;
        if record.is_incremental() {
            writeln!(f, "  Files linked:  {}", stats.files_linked)?;
            if stats.files_copy_fallback > 0 {
                writeln!(f, "  Link fallback: {} (copied)", stats.files_copy_fallback)?;
            }
            if report.deleted_files > 0 {
                writeln!(f, "  Deleted:       {}", report.deleted_files)?;
            }
        }
        writeln!(f, "  Data copied:   {}", format_bytes(stats.bytes_copied))?;
        writeln!(f, "  Duration:      {}", format_duration(report.duration.as_secs()))?;

        let failures: Vec<_> = report.failures().collect();
        if !failures.is_empty() {
            writeln!(f, "  Skipped:       {}", failures.len())?;
            for diagnostic in failures {
                writeln!(f, "    {diagnostic}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backup_engine::config::Config;
    use backup_engine::executor::Clock;
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicI64, Ordering};
    use tempfile::TempDir;

    struct StepClock(AtomicI64);

    impl Clock for StepClock {
        fn now(&self) -> NaiveDateTime {
            let step = self.0.fetch_add(1, Ordering::SeqCst);
            let base = NaiveDate::from_ymd_opt(2024, 3, 1)
                .and_then(|d| d.and_hms_opt(9, 0, 0))
                .unwrap();
            base + Duration::seconds(step)
        }
    }

    fn backup_args(temp_dir: &TempDir) -> BackupArgs {
        BackupArgs {
            source: temp_dir.path().join("source"),
            backup_root: temp_dir.path().join("backups"),
        }
    }

    #[tokio::test]
    async fn test_execute_full_then_noop() {
        let temp_dir = TempDir::new().unwrap();
        let args = backup_args(&temp_dir);
        fs::create_dir_all(&args.source).unwrap();
        fs::write(args.source.join("file.txt"), b"content").unwrap();

        let clock = StepClock(AtomicI64::new(0));
        let engine = Arc::new(BackupEngine::new(Config::default()).with_clock(clock));
        let ledger = Arc::new(Mutex::new(SnapshotLedger::new()));

        let outcome = execute(engine.clone(), ledger.clone(), BackupMode::Full, args.clone())
            .await
            .unwrap();
        assert!(Summary(&outcome).to_string().contains("Files written: 1/1"));

        let outcome = execute(engine, ledger.clone(), BackupMode::Incremental, args)
            .await
            .unwrap();
        assert!(matches!(outcome, BackupOutcome::NoChanges { .. }));
        assert_eq!(ledger.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_execute_missing_source_fails() {
        let temp_dir = TempDir::new().unwrap();
        let args = backup_args(&temp_dir);
        let engine = Arc::new(BackupEngine::new(Config::default()));
        let ledger = Arc::new(Mutex::new(SnapshotLedger::new()));

        let err = execute(engine, ledger, BackupMode::Full, args).await.unwrap_err();
        assert!(err.to_string().contains("full backup of"));
    }

    #[test]
    fn test_no_changes_summary() {
        let outcome = BackupOutcome::NoChanges {
            latest_snapshot: PathBuf::from("/backups/backup_20240101_000000"),
            total_source_files: 7,
        };
        let text = Summary(&outcome).to_string();
        assert!(text.starts_with(
            "No changes detected since /backups/backup_20240101_000000 (7 files checked)"
        ));
    }
}
