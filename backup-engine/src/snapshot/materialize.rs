//! Building a snapshot directory from a change set.
//!
//! New and modified files are copied from the source. Unchanged files are
//! hard-linked from the prior snapshot; when the link is refused (another
//! filesystem, no link support, permissions) the prior copy is duplicated
//! instead. Per-file faults are counted and reported, never fatal.

use super::diff::ChangeSet;
use crate::fs::walker::FileRecord;
use crate::transfer::progress::{format_speed, ProgressTracker};
use crate::{BackupError, Diagnostic, DiagnosticKind, Result};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Strategy for carrying an unchanged file into the new snapshot.
pub trait FileLinker {
    /// Make `link` refer to the content of `original`
    fn link(&self, original: &Path, link: &Path) -> io::Result<()>;
}

/// Hard-links with `std::fs::hard_link`
#[derive(Debug, Clone, Copy, Default)]
pub struct HardLinker;

impl FileLinker for HardLinker {
    fn link(&self, original: &Path, link: &Path) -> io::Result<()> {
        fs::hard_link(original, link)
    }
}

/// Refuses every link, so unchanged files are always copied
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyOnlyLinker;

impl FileLinker for CopyOnlyLinker {
    fn link(&self, _original: &Path, _link: &Path) -> io::Result<()> {
        Err(io::Error::new(ErrorKind::Unsupported, "linking disabled by configuration"))
    }
}

/// Counters for one materialization
#[derive(Debug, Clone, Default, Serialize)]
pub struct MaterializeStats {
    /// Files copied from the source (new or modified)
    pub files_copied: usize,
    /// Unchanged files hard-linked from the prior snapshot
    pub files_linked: usize,
    /// Unchanged files copied from the prior snapshot after a failed link
    pub files_copy_fallback: usize,
    /// Files that could not be written at all
    pub files_failed: usize,
    /// Bytes copied (source copies plus fallback copies)
    pub bytes_copied: u64,
    /// Bytes carried over by hard links
    pub bytes_linked: u64,
    #[serde(skip)]
    pub diagnostics: Vec<Diagnostic>,
}

impl MaterializeStats {
    /// Files whose bytes were physically written into the snapshot
    pub fn files_written(&self) -> usize {
        self.files_copied + self.files_copy_fallback
    }
}

/// Create `destination` and populate it from `changes`.
///
/// `destination` must not exist yet. Its parent is created as needed.
///
/// # Errors
/// * `SnapshotExists` - if `destination` is already present
/// * `DestinationWriteFailure` - if the snapshot directory cannot be created
pub fn materialize(
    changes: &ChangeSet,
    source_root: &Path,
    destination: &Path,
    linker: &dyn FileLinker,
    buffer_size: usize,
) -> Result<MaterializeStats> {
    create_snapshot_dir(destination)?;

    let mut stats = MaterializeStats::default();
    let mut tracker = ProgressTracker::new(changes.total_files());

    info!(
        files = changes.to_copy.len(),
        destination = %destination.display(),
        "Copying new and modified files"
    );
    for record in &changes.to_copy {
        let from = source_root.join(&record.relative_path);
        let to = destination.join(&record.relative_path);

        match copy_file(&from, &to, buffer_size) {
            Ok(bytes) => {
                stats.files_copied += 1;
                stats.bytes_copied += bytes;
            }
            Err(e) => fail(&mut stats, record, e),
        }
        report(&mut tracker, record.size);
    }

    if !changes.to_link.is_empty() {
        info!(files = changes.to_link.len(), "Carrying over unchanged files");
    }
    for record in &changes.to_link {
        let Some(prior_root) = changes.prior_root.as_deref() else {
            let e = BackupError::UnreadableFile {
                path: record.relative_path.clone(),
                source: io::Error::new(ErrorKind::NotFound, "no prior snapshot to link from"),
            };
            fail(&mut stats, record, e);
            continue;
        };
        link_or_copy(record, prior_root, destination, linker, buffer_size, &mut stats);
        report(&mut tracker, record.size);
    }

    info!(
        copied = stats.files_copied,
        linked = stats.files_linked,
        copy_fallback = stats.files_copy_fallback,
        failed = stats.files_failed,
        elapsed_ms = tracker.elapsed().as_millis() as u64,
        throughput = %format_speed(tracker.average_speed()),
        "Snapshot materialized"
    );

    Ok(stats)
}

/// Carry one unchanged file over from the prior snapshot
fn link_or_copy(
    record: &FileRecord,
    prior_root: &Path,
    destination: &Path,
    linker: &dyn FileLinker,
    buffer_size: usize,
    stats: &mut MaterializeStats,
) {
    let from = prior_root.join(&record.relative_path);
    let to = destination.join(&record.relative_path);

    if let Err(e) = ensure_parent(&to) {
        fail(stats, record, e);
        return;
    }

    match linker.link(&from, &to) {
        Ok(()) => {
            stats.files_linked += 1;
            stats.bytes_linked += record.size;
        }
        Err(link_err) => {
            debug!(
                path = %record.relative_path.display(),
                error = %link_err,
                "Hard link failed, copying from prior snapshot"
            );
            match copy_file(&from, &to, buffer_size) {
                Ok(bytes) => {
                    stats.files_copy_fallback += 1;
                    stats.bytes_copied += bytes;
                    stats.diagnostics.push(Diagnostic::new(
                        record.relative_path.clone(),
                        DiagnosticKind::LinkFallback,
                        link_err,
                    ));
                }
                Err(e) => fail(stats, record, e),
            }
        }
    }
}

/// Create the snapshot directory itself, refusing to reuse an existing one
fn create_snapshot_dir(destination: &Path) -> Result<()> {
    let write_failure = |source| BackupError::DestinationWriteFailure {
        path: destination.to_path_buf(),
        source,
    };

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(write_failure)?;
    }

    match fs::create_dir(destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            Err(BackupError::SnapshotExists(destination.to_path_buf()))
        }
        Err(e) => Err(write_failure(e)),
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent).map_err(|source| {
            BackupError::DestinationWriteFailure {
                path: parent.to_path_buf(),
                source,
            }
        }),
        None => Ok(()),
    }
}

/// Stream `from` into `to`, overwriting `to`. Returns bytes written.
///
/// Read faults map to `UnreadableFile`, write faults to
/// `DestinationWriteFailure`, so the diagnostic names the side that failed.
pub fn copy_file(from: &Path, to: &Path, buffer_size: usize) -> Result<u64> {
    let unreadable = |source| BackupError::UnreadableFile {
        path: from.to_path_buf(),
        source,
    };
    let write_failure = |source| BackupError::DestinationWriteFailure {
        path: to.to_path_buf(),
        source,
    };

    let mut reader = File::open(from).map_err(unreadable)?;
    let permissions = reader.metadata().map_err(unreadable)?.permissions();

    ensure_parent(to)?;
    let mut writer = File::create(to).map_err(write_failure)?;

    let mut buffer = vec![0u8; buffer_size.max(1)];
    let mut written = 0u64;
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(unreadable(e)),
        };
        writer.write_all(&buffer[..bytes_read]).map_err(write_failure)?;
        written += bytes_read as u64;
    }
    writer.flush().map_err(write_failure)?;

    if let Err(e) = fs::set_permissions(to, permissions) {
        debug!(path = %to.display(), error = %e, "Could not copy permissions");
    }

    Ok(written)
}

fn fail(stats: &mut MaterializeStats, record: &FileRecord, err: BackupError) {
    warn!(
        path = %record.relative_path.display(),
        error = %err,
        "Failed to write file into snapshot"
    );
    stats.files_failed += 1;
    let diagnostic = err.to_diagnostic().unwrap_or_else(|| {
        Diagnostic::new(
            PathBuf::from(&record.relative_path),
            DiagnosticKind::DestinationWriteFailure,
            &err,
        )
    });
    stats.diagnostics.push(diagnostic);
}

fn report(tracker: &mut ProgressTracker, bytes: u64) {
    if tracker.record_file(bytes) {
        info!(
            "Processed {}/{} files ({:.0}%)",
            tracker.files_processed(),
            tracker.total_files(),
            tracker.percent_complete()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::walker::{scan_tree, Inventory, WalkOptions};
    use crate::snapshot::diff::resolve_changes;
    use tempfile::TempDir;

    const BUF: usize = 4096;

    fn write(root: &Path, rel: &str, content: &[u8]) -> io::Result<()> {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap())?;
        fs::write(path, content)
    }

    fn scan(root: &Path) -> Result<Inventory> {
        Ok(scan_tree(root, &WalkOptions::default())?.inventory)
    }

    #[test]
    fn test_full_copy_mirrors_tree() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        write(&source, "a.txt", b"alpha")?;
        write(&source, "nested/deep/b.txt", b"beta")?;

        let changes = ChangeSet::full(&scan(&source)?);
        let destination = temp_dir.path().join("backups/backup_20240101_000000");
        let stats = materialize(&changes, &source, &destination, &HardLinker, BUF)?;

        assert_eq!(stats.files_copied, 2);
        assert_eq!(stats.files_written(), 2);
        assert_eq!(stats.bytes_copied, 9);
        assert_eq!(fs::read(destination.join("nested/deep/b.txt"))?, b"beta");
        Ok(())
    }

    #[test]
    fn test_existing_destination_is_refused() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let destination = temp_dir.path().join("backup_20240101_000000");
        fs::create_dir(&destination)?;

        let result = materialize(
            &ChangeSet::default(),
            temp_dir.path(),
            &destination,
            &HardLinker,
            BUF,
        );
        assert!(matches!(result, Err(BackupError::SnapshotExists(_))));
        Ok(())
    }

    #[test]
    #[cfg(unix)]
    fn test_unchanged_files_are_hard_linked() -> Result<()> {
        use std::os::unix::fs::MetadataExt;

        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        let prior = temp_dir.path().join("backup_20240101_000000");
        write(&source, "same.txt", b"unchanged")?;
        write(&source, "edit.txt", b"new content")?;
        write(&prior, "same.txt", b"unchanged")?;
        write(&prior, "edit.txt", b"old content")?;

        let changes = resolve_changes(&scan(&source)?, &scan(&prior)?);
        let destination = temp_dir.path().join("backup_20240102_000000");
        let stats = materialize(&changes, &source, &destination, &HardLinker, BUF)?;

        assert_eq!(stats.files_copied, 1);
        assert_eq!(stats.files_linked, 1);
        assert_eq!(stats.files_copy_fallback, 0);
        assert_eq!(
            fs::metadata(destination.join("same.txt"))?.ino(),
            fs::metadata(prior.join("same.txt"))?.ino()
        );
        assert_eq!(fs::read(destination.join("edit.txt"))?, b"new content");
        Ok(())
    }

    #[test]
    fn test_link_failure_falls_back_to_copy() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        let prior = temp_dir.path().join("backup_20240101_000000");
        write(&source, "dir/same.txt", b"unchanged")?;
        write(&prior, "dir/same.txt", b"unchanged")?;
        write(&source, "added.txt", b"added")?;

        let changes = resolve_changes(&scan(&source)?, &scan(&prior)?);
        let destination = temp_dir.path().join("backup_20240102_000000");
        let stats = materialize(&changes, &source, &destination, &CopyOnlyLinker, BUF)?;

        assert_eq!(stats.files_linked, 0);
        assert_eq!(stats.files_copy_fallback, 1);
        assert_eq!(stats.files_failed, 0);
        assert_eq!(stats.files_written(), 2);
        assert_eq!(fs::read(destination.join("dir/same.txt"))?, b"unchanged");
        assert!(stats.diagnostics.iter().all(|d| !d.is_failure()));
        Ok(())
    }

    #[test]
    fn test_linked_file_read_from_snapshot_not_source() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        let prior = temp_dir.path().join("backup_20240101_000000");
        write(&source, "keep.txt", b"keep")?;
        write(&prior, "keep.txt", b"keep")?;
        write(&source, "new.txt", b"new")?;

        let changes = resolve_changes(&scan(&source)?, &scan(&prior)?);
        // Source copy disappears after the scan
        fs::remove_file(source.join("keep.txt"))?;

        let destination = temp_dir.path().join("backup_20240102_000000");
        let stats = materialize(&changes, &source, &destination, &CopyOnlyLinker, BUF)?;

        assert_eq!(stats.files_failed, 0);
        assert_eq!(fs::read(destination.join("keep.txt"))?, b"keep");
        Ok(())
    }

    #[test]
    fn test_vanished_source_file_is_counted_not_fatal() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        write(&source, "stays.txt", b"stays")?;
        write(&source, "goes.txt", b"goes")?;

        let changes = ChangeSet::full(&scan(&source)?);
        fs::remove_file(source.join("goes.txt"))?;

        let destination = temp_dir.path().join("backup_20240101_000000");
        let stats = materialize(&changes, &source, &destination, &HardLinker, BUF)?;

        assert_eq!(stats.files_copied, 1);
        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.diagnostics.len(), 1);
        assert_eq!(stats.diagnostics[0].kind, DiagnosticKind::UnreadableFile);
        Ok(())
    }

    /// Links normally, except that it leaves a directory in place of `blocked.txt`
    struct BlockingLinker;

    impl FileLinker for BlockingLinker {
        fn link(&self, original: &Path, link: &Path) -> io::Result<()> {
            if link.ends_with("blocked.txt") {
                fs::create_dir(link)?;
                return Err(io::Error::other("link refused"));
            }
            fs::hard_link(original, link)
        }
    }

    #[test]
    fn test_destination_write_failure_is_counted_not_fatal() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let source = temp_dir.path().join("source");
        let prior = temp_dir.path().join("backup_20240101_000000");
        for root in [&source, &prior] {
            write(root, "blocked.txt", b"blocked")?;
            write(root, "fine.txt", b"fine")?;
        }
        write(&source, "new.txt", b"new")?;

        let changes = resolve_changes(&scan(&source)?, &scan(&prior)?);
        let destination = temp_dir.path().join("backup_20240102_000000");
        let stats = materialize(&changes, &source, &destination, &BlockingLinker, BUF)?;

        assert_eq!(stats.files_failed, 1);
        assert_eq!(stats.files_copied, 1);
        assert_eq!(stats.files_linked, 1);
        assert_eq!(fs::read(destination.join("fine.txt"))?, b"fine");
        assert_eq!(fs::read(destination.join("new.txt"))?, b"new");

        let failures: Vec<_> = stats.diagnostics.iter().filter(|d| d.is_failure()).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, DiagnosticKind::DestinationWriteFailure);
        assert!(failures[0].path.ends_with("blocked.txt"));
        Ok(())
    }

    #[test]
    fn test_copy_file_overwrites() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let from = temp_dir.path().join("from.txt");
        let to = temp_dir.path().join("sub/to.txt");
        fs::write(&from, b"fresh")?;
        write(temp_dir.path(), "sub/to.txt", b"stale and longer")?;

        assert_eq!(copy_file(&from, &to, 2)?, 5);
        assert_eq!(fs::read(&to)?, b"fresh");
        Ok(())
    }
}
