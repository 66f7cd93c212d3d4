//! File metadata captured alongside each fingerprint.
//!
//! Size and modification time are informational only. Change detection never
//! looks at them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// File size in bytes
    pub size: u64,

    /// Last modified time, if the platform reports one
    pub modified: Option<DateTime<Utc>>,
}

impl FileMetadata {
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}
