//! Filesystem access: content fingerprints, metadata and tree scanning.

pub mod fingerprint;
pub mod metadata;
pub mod walker;

pub use fingerprint::{fingerprint_bytes, fingerprint_file, DEFAULT_BUFFER_SIZE};
pub use walker::{scan_tree, FileRecord, Inventory, ScanResult, WalkOptions};
