//! File-level progress tracking for snapshot runs.
//!
//! The materializer feeds one update per file; the tracker decides when a
//! progress line is worth logging and keeps the averages for the summary.

use std::time::{Duration, Instant};

/// Log a progress line at least every this many files
const REPORT_EVERY_FILES: usize = 100;

/// ...or when this much time has passed since the last line
const REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Progress tracker with time-based speed calculation
#[derive(Debug)]
pub struct ProgressTracker {
    start_time: Instant,
    last_report: Instant,
    total_files: usize,
    files_processed: usize,
    bytes_processed: u64,
}

impl ProgressTracker {
    /// Create a new progress tracker
    pub fn new(total_files: usize) -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_report: now,
            total_files,
            files_processed: 0,
            bytes_processed: 0,
        }
    }

    /// Count one finished file. Returns true when a progress line is due.
    pub fn record_file(&mut self, bytes: u64) -> bool {
        self.files_processed += 1;
        self.bytes_processed += bytes;

        let due = self.files_processed % REPORT_EVERY_FILES == 0
            || self.last_report.elapsed() >= REPORT_INTERVAL;
        if due {
            self.last_report = Instant::now();
        }
        due && !self.is_complete()
    }

    pub fn files_processed(&self) -> usize {
        self.files_processed
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    /// Percentage of files processed (0-100)
    pub fn percent_complete(&self) -> f64 {
        if self.total_files > 0 {
            (self.files_processed as f64 / self.total_files as f64) * 100.0
        } else {
            100.0
        }
    }

    /// Check if every file has been processed
    pub fn is_complete(&self) -> bool {
        self.files_processed >= self.total_files
    }

    /// Get total elapsed time
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get average speed since start
    pub fn average_speed(&self) -> u64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            (self.bytes_processed as f64 / elapsed) as u64
        } else {
            0
        }
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format speed as human-readable string
pub fn format_speed(bytes_per_second: u64) -> String {
    format!("{}/s", format_bytes(bytes_per_second))
}

/// Format duration as human-readable string
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
