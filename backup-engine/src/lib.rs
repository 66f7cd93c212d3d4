//! Backup Engine Library
//!
//! Point-in-time snapshots of a directory tree. Full backups copy every file;
//! incremental backups fingerprint the source, diff it against the latest
//! snapshot and hard-link whatever did not change.

pub mod config;
pub mod executor;
pub mod fs;
pub mod ledger;
pub mod snapshot;
pub mod transfer;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use executor::{BackupEngine, BackupOutcome, BackupReport, Clock, RunPhase, SystemClock};
pub use ledger::{BackupKind, SnapshotLedger, SnapshotRecord};
pub use utils::errors::{BackupError, Diagnostic, DiagnosticKind};
pub type Result<T> = std::result::Result<T, BackupError>;
