//! Custom error types for the backup engine.
//!
//! Fatal conditions surface as [`BackupError`]. Per-file faults never abort a
//! run; they are collected as [`Diagnostic`] values on the outcome instead.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Cannot read file {}: {source}", path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot write {}: {source}", path.display())]
    DestinationWriteFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Source directory does not exist: {}", .0.display())]
    MissingSourceRoot(PathBuf),

    #[error("Source path is not a directory: {}", .0.display())]
    SourceNotDirectory(PathBuf),

    #[error("Snapshot directory already exists: {}", .0.display())]
    SnapshotExists(PathBuf),

    #[error("History file {}: {source}", path.display())]
    History {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, BackupError>;

/// Category of a non-fatal, per-file fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Fingerprinting or copy source could not be read.
    UnreadableFile,
    /// Copy target or its parent directory could not be written.
    DestinationWriteFailure,
    /// Hard link was refused and the file was copied instead.
    LinkFallback,
    /// The history log or ledger journal could not be appended.
    HistoryWrite,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DiagnosticKind::UnreadableFile => "unreadable file",
            DiagnosticKind::DestinationWriteFailure => "destination write failure",
            DiagnosticKind::LinkFallback => "link fallback",
            DiagnosticKind::HistoryWrite => "history write failure",
        };
        f.write_str(label)
    }
}

/// A per-file fault recorded during a run.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub path: PathBuf,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<PathBuf>, kind: DiagnosticKind, message: impl fmt::Display) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.to_string(),
        }
    }

    /// Whether this diagnostic represents lost work rather than a fallback.
    pub fn is_failure(&self) -> bool {
        !matches!(self.kind, DiagnosticKind::LinkFallback)
    }
}

impl BackupError {
    /// Per-file errors convert to a diagnostic; fatal ones return `None`.
    pub fn to_diagnostic(&self) -> Option<Diagnostic> {
        match self {
            BackupError::UnreadableFile { path, source } => Some(Diagnostic::new(
                path.clone(),
                DiagnosticKind::UnreadableFile,
                source,
            )),
            BackupError::DestinationWriteFailure { path, source } => Some(Diagnostic::new(
                path.clone(),
                DiagnosticKind::DestinationWriteFailure,
                source,
            )),
            BackupError::History { path, source } => Some(Diagnostic::new(
                path.clone(),
                DiagnosticKind::HistoryWrite,
                source,
            )),
            _ => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.path.display(), self.kind, self.message)
    }
}
