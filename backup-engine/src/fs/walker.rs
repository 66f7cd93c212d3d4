//! Directory traversal producing a fingerprinted file inventory.
//!
//! Every regular file under the root is fingerprinted and recorded relative to
//! that root. Symlinks are never inventoried. A file that cannot be read is
//! reported as a diagnostic and left out; it never aborts the scan.

use crate::config::ScanConfig;
use crate::fs::fingerprint::{fingerprint_file, DEFAULT_BUFFER_SIZE};
use crate::fs::metadata::FileMetadata;
use crate::{BackupError, Diagnostic, DiagnosticKind, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Follow symbolic links to directories
    pub follow_links: bool,

    /// File-name substrings to exclude
    pub exclude_patterns: Vec<String>,

    /// Directories pruned from traversal (as joined onto the scan root)
    pub skip_dirs: Vec<PathBuf>,

    /// Read buffer used while fingerprinting
    pub buffer_size: usize,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            follow_links: false,
            exclude_patterns: Vec::new(),
            skip_dirs: Vec::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl WalkOptions {
    pub fn from_config(scan: &ScanConfig, buffer_size: usize) -> Self {
        Self {
            follow_links: scan.follow_links,
            exclude_patterns: scan.exclude_patterns.clone(),
            skip_dirs: Vec::new(),
            buffer_size,
        }
    }

    /// Prune `dir` from traversal
    pub fn skip_dir(mut self, dir: PathBuf) -> Self {
        self.skip_dirs.push(dir);
        self
    }
}

/// One regular file found during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the scanned root; the identity key across trees
    pub relative_path: PathBuf,

    /// Lowercase hex content digest
    pub digest: String,

    /// File size in bytes
    pub size: u64,

    /// Last modified time
    pub modified: Option<DateTime<Utc>>,
}

/// Fingerprinted files of one tree, sorted by relative path.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    root: PathBuf,
    records: Vec<FileRecord>,
}

impl Inventory {
    /// Build an inventory, sorting records by relative path
    pub fn new(root: impl Into<PathBuf>, mut records: Vec<FileRecord>) -> Self {
        records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        Self {
            root: root.into(),
            records,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FileRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Look up a record by relative path
    pub fn get(&self, relative_path: &Path) -> Option<&FileRecord> {
        self.records
            .binary_search_by(|r| r.relative_path.as_path().cmp(relative_path))
            .ok()
            .map(|i| &self.records[i])
    }

    /// Sum of all file sizes
    pub fn total_bytes(&self) -> u64 {
        self.records.iter().map(|r| r.size).sum()
    }
}

impl<'a> IntoIterator for &'a Inventory {
    type Item = &'a FileRecord;
    type IntoIter = std::slice::Iter<'a, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Result of scanning one tree
#[derive(Debug, Default)]
pub struct ScanResult {
    pub inventory: Inventory,
    pub diagnostics: Vec<Diagnostic>,
}

/// Walk `root`, fingerprinting every regular file.
///
/// # Returns
/// * `Ok(ScanResult)` - Inventory plus per-file diagnostics
/// * `Err(UnreadableFile)` - If the root itself cannot be read
///
/// # Example
/// ```no_run
/// use backup_engine::fs::walker::{scan_tree, WalkOptions};
/// use std::path::Path;
///
/// let scan = scan_tree(Path::new("/data"), &WalkOptions::default()).unwrap();
/// println!("Found {} files", scan.inventory.len());
/// ```
pub fn scan_tree(root: &Path, options: &WalkOptions) -> Result<ScanResult> {
    let mut records = Vec::new();
    let mut diagnostics = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !should_prune(entry, options));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory loop at scan root"));
                return Err(BackupError::UnreadableFile {
                    path: root.to_path_buf(),
                    source,
                });
            }
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                diagnostics.push(Diagnostic::new(path, DiagnosticKind::UnreadableFile, e));
                continue;
            }
        };

        // Directories are traversed, symlinks and special files are not recorded
        if !entry.file_type().is_file() || entry.path_is_symlink() {
            continue;
        }

        match record_file(&entry, root, options.buffer_size) {
            Ok(record) => {
                debug!(
                    path = %record.relative_path.display(),
                    digest = %record.digest,
                    "Fingerprinted"
                );
                records.push(record);
            }
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Skipping file");
                if let Some(diagnostic) = e.to_diagnostic() {
                    diagnostics.push(diagnostic);
                }
            }
        }
    }

    Ok(ScanResult {
        inventory: Inventory::new(root, records),
        diagnostics,
    })
}

/// Fingerprint one directory entry into a record relative to `root`
fn record_file(entry: &DirEntry, root: &Path, buffer_size: usize) -> Result<FileRecord> {
    let path = entry.path();
    let unreadable = |source| BackupError::UnreadableFile {
        path: path.to_path_buf(),
        source,
    };

    let metadata = entry.metadata().map_err(|e| {
        let source = e
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other("metadata unavailable"));
        unreadable(source)
    })?;
    let metadata = FileMetadata::from_metadata(&metadata);
    let digest = fingerprint_file(path, buffer_size)?;

    let relative_path = path
        .strip_prefix(root)
        .map(Path::to_path_buf)
        .map_err(|_| {
            BackupError::Config(format!(
                "{} is not under scan root {}",
                path.display(),
                root.display()
            ))
        })?;

    Ok(FileRecord {
        relative_path,
        digest,
        size: metadata.size,
        modified: metadata.modified,
    })
}

/// Check if an entry (and everything below it) should be left out
fn should_prune(entry: &DirEntry, options: &WalkOptions) -> bool {
    if entry.file_type().is_dir() && options.skip_dirs.iter().any(|d| d == entry.path()) {
        return true;
    }

    let file_name = entry.file_name().to_string_lossy();
    options
        .exclude_patterns
        .iter()
        .any(|pattern| file_name.contains(pattern.as_str()))
}
