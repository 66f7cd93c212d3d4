//! Configuration management for the backup engine.
//!
//! Every field has a default, so a missing configuration file reproduces the
//! stock behavior. The engine itself only ever needs the two directory paths
//! supplied per invocation; this file tunes scanning, linking and logging.

use crate::{BackupError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Descend into symlinked directories. Symlinks themselves are never
    /// inventoried.
    #[serde(default)]
    pub follow_links: bool,

    /// File-name substrings to skip
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// How unchanged files are carried into a new snapshot
    #[serde(default)]
    pub link_mode: LinkMode,

    /// Read buffer for fingerprinting and copying, in bytes
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Hard-link from the prior snapshot, copying when the link fails
    #[default]
    Hardlink,
    /// Never link; always copy from the prior snapshot
    Copy,
}

// Default values
fn default_log_level() -> String {
    "info".to_string()
}

fn default_buffer_size() -> usize {
    16 * 1024 // 16KB
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            link_mode: LinkMode::default(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.snapshot.buffer_size == 0 {
            return Err(BackupError::Config(
                "snapshot.buffer_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.log.level, "info");
        assert!(!config.scan.follow_links);
        assert!(config.scan.exclude_patterns.is_empty());
        assert_eq!(config.snapshot.link_mode, LinkMode::Hardlink);
        assert_eq!(config.snapshot.buffer_size, 16 * 1024);
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("backup.toml");
        std::fs::write(
            &path,
            "[snapshot]\nlink_mode = \"copy\"\n\n[scan]\nexclude_patterns = [\".DS_Store\"]\n",
        )?;

        let config = Config::from_file(&path)?;
        assert_eq!(config.snapshot.link_mode, LinkMode::Copy);
        assert_eq!(config.snapshot.buffer_size, 16 * 1024);
        assert_eq!(config.scan.exclude_patterns, vec![".DS_Store".to_string()]);
        assert_eq!(config.log.level, "info");
        Ok(())
    }

    #[test]
    fn test_zero_buffer_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("backup.toml");
        std::fs::write(&path, "[snapshot]\nbuffer_size = 0\n")?;

        let result = Config::from_file(&path);
        assert!(matches!(result, Err(BackupError::Config(_))));
        Ok(())
    }

    #[test]
    fn test_unknown_link_mode_rejected() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("backup.toml");
        std::fs::write(&path, "[snapshot]\nlink_mode = \"symlink\"\n")?;

        assert!(matches!(Config::from_file(&path), Err(BackupError::TomlParse(_))));
        Ok(())
    }
}
