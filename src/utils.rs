use chrono::Local;
use std::time::Duration;

use crate::constants::TIMESTAMP_FORMAT;

/// Elapsed time as `HH:MM:SS`; hours are not wrapped at a day.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total_secs / 3600,
        (total_secs % 3600) / 60,
        total_secs % 60
    )
}

/// Size in megabytes, rounded to two decimals for log output.
pub fn size_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1_048_576.0 * 100.0).round() / 100.0
}

/// Local time formatted for backup file and directory names.
pub fn timestamp_now() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}
