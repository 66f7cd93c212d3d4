//! Progress accounting for snapshot materialization.

pub mod progress;

pub use progress::{format_bytes, format_duration, format_speed, ProgressTracker};
