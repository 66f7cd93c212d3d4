//! Discovery of existing snapshots under a backup root.

use super::parse_snapshot_name;
use crate::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A snapshot directory found on disk
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SnapshotDir {
    /// Directory name, e.g. `backup_20240101_120000`
    pub name: String,

    /// Timestamp part of the name
    pub timestamp: String,

    /// Full path to the directory
    pub path: PathBuf,
}

/// List snapshot directories under `backup_root`, oldest first.
///
/// A missing backup root simply has no snapshots.
pub fn find_snapshots(backup_root: &Path) -> Result<Vec<SnapshotDir>> {
    if !backup_root.exists() {
        return Ok(Vec::new());
    }

    let mut snapshots = Vec::new();

    for entry in fs::read_dir(backup_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        match parse_snapshot_name(name) {
            Some(timestamp) => snapshots.push(SnapshotDir {
                name: name.to_string(),
                timestamp: timestamp.to_string(),
                path: entry.path(),
            }),
            None => debug!(name, "Ignoring directory outside the snapshot naming convention"),
        }
    }

    // Zero-padded timestamps make name order chronological
    snapshots.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(snapshots)
}

/// Most recent snapshot under `backup_root`, if any
pub fn latest_snapshot(backup_root: &Path) -> Result<Option<SnapshotDir>> {
    Ok(find_snapshots(backup_root)?.pop())
}
