//! Change detection between the live source and the latest snapshot.
//!
//! Equality is decided by content digest at the same relative path. Size and
//! mtime are never consulted, so touched-but-identical files are still linked
//! and same-size edits with a restored mtime are still copied.

use crate::fs::walker::{FileRecord, Inventory};
use std::path::PathBuf;

/// Partition of the source inventory into copy and link work.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Source records that are new or whose content differs from the prior snapshot
    pub to_copy: Vec<FileRecord>,

    /// Prior-snapshot records whose content is unchanged in the source.
    /// These are read from the snapshot, never from the live source.
    pub to_link: Vec<FileRecord>,

    /// Paths present in the prior snapshot but gone from the source
    pub deleted: usize,

    /// Root of the snapshot that `to_link` records live in
    pub prior_root: Option<PathBuf>,
}

impl ChangeSet {
    /// Change set of a full backup: everything is copied
    pub fn full(source: &Inventory) -> Self {
        Self {
            to_copy: source.records().to_vec(),
            to_link: Vec::new(),
            deleted: 0,
            prior_root: None,
        }
    }

    /// Nothing new or modified; an incremental run has no work to do
    pub fn is_noop(&self) -> bool {
        self.to_copy.is_empty()
    }

    /// Number of source files covered by this change set
    pub fn total_files(&self) -> usize {
        self.to_copy.len() + self.to_link.len()
    }

    pub fn copy_bytes(&self) -> u64 {
        self.to_copy.iter().map(|r| r.size).sum()
    }

    pub fn link_bytes(&self) -> u64 {
        self.to_link.iter().map(|r| r.size).sum()
    }
}

/// Classify every source record as copy or link against the prior snapshot.
pub fn resolve_changes(source: &Inventory, prior: &Inventory) -> ChangeSet {
    let mut to_copy = Vec::new();
    let mut to_link = Vec::new();

    for record in source {
        match prior.get(&record.relative_path) {
            Some(previous) if previous.digest == record.digest => to_link.push(previous.clone()),
            _ => to_copy.push(record.clone()),
        }
    }

    let deleted = prior
        .iter()
        .filter(|record| source.get(&record.relative_path).is_none())
        .count();

    ChangeSet {
        to_copy,
        to_link,
        deleted,
        prior_root: Some(prior.root().to_path_buf()),
    }
}
