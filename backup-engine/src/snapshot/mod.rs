//! Snapshot directories under a backup root.
//!
//! A snapshot is a plain directory named `backup_<YYYYMMDD_HHMMSS>` that
//! mirrors the source tree. Unchanged files are hard links into the previous
//! snapshot whenever the filesystem allows it.

pub mod diff;
pub mod locator;
pub mod materialize;

pub use diff::{resolve_changes, ChangeSet};
pub use locator::{find_snapshots, latest_snapshot, SnapshotDir};
pub use materialize::{materialize, CopyOnlyLinker, FileLinker, HardLinker, MaterializeStats};

use chrono::NaiveDateTime;

/// Name prefix reserved for snapshot directories
pub const SNAPSHOT_PREFIX: &str = "backup_";

/// `chrono` format of the snapshot timestamp; zero-padded so names sort chronologically
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Format a snapshot timestamp
pub fn format_timestamp(time: &NaiveDateTime) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Directory name for a snapshot taken at `timestamp`
pub fn snapshot_dir_name(timestamp: &str) -> String {
    format!("{SNAPSHOT_PREFIX}{timestamp}")
}

/// Extract the timestamp from a snapshot directory name, if it follows the convention
pub fn parse_snapshot_name(name: &str) -> Option<&str> {
    let timestamp = name.strip_prefix(SNAPSHOT_PREFIX)?;
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
    Some(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_timestamp_format_is_zero_padded() {
        let time = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(4, 5, 6)
            .unwrap();
        let timestamp = format_timestamp(&time);
        assert_eq!(timestamp, "20240307_040506");
        assert_eq!(snapshot_dir_name(&timestamp), "backup_20240307_040506");
    }

    #[test]
    fn test_parse_snapshot_name() {
        assert_eq!(parse_snapshot_name("backup_20240307_040506"), Some("20240307_040506"));
        assert_eq!(parse_snapshot_name("backup_history.txt"), None);
        assert_eq!(parse_snapshot_name("backup_2024"), None);
        assert_eq!(parse_snapshot_name("snapshot_20240307_040506"), None);
    }
}
