use super::dump_converter::DumpConverter;
use super::source::find_dumps;
use crate::models::ValueMode;
use crate::utils::format_elapsed;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

/// Outcome of a [`convert_files`] run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// CSV files written
    pub converted: Vec<PathBuf>,
    /// Dumps without rows (no CSV written)
    pub empty: Vec<PathBuf>,
    /// Dumps that failed, with the error message
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchSummary {
    pub fn total(&self) -> usize {
        self.converted.len() + self.empty.len() + self.failed.len()
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Converts every dump in `paths` to CSV, one file after the other.
///
/// Directories are expanded to the dumps they contain. A failing file is
/// logged and recorded in the summary, then the batch moves on; the row count
/// of every attempt is logged whether it succeeded or not.
pub fn convert_files(paths: &[PathBuf], mode: ValueMode) -> BatchSummary {
    let files = find_dumps(paths);
    let mut summary = BatchSummary::default();
    let start = Instant::now();

    info!(
        files = files.len(),
        mode = mode.display_name(),
        "Starting conversion"
    );

    for file in files {
        info!(file = %file.display(), "Converting");
        let mut converter = DumpConverter::new(mode);
        let result = converter.convert_file(&file);

        info!(
            rows = converter.rows(),
            file = %file.display(),
            "Parsed {} rows in file {}",
            converter.rows(),
            file.display()
        );

        match result {
            Ok(Some(_)) => summary.converted.push(file),
            Ok(None) => {
                info!(file = %file.display(), "Dump contains no rows, no CSV written");
                summary.empty.push(file);
            }
            Err(e) => {
                error!(file = %file.display(), error = %e, "Conversion failed");
                summary.failed.push((file, e.to_string()));
            }
        }
    }

    info!(
        converted = summary.converted.len(),
        empty = summary.empty.len(),
        failed = summary.failed.len(),
        elapsed = %format_elapsed(start.elapsed()),
        "Conversion completed"
    );

    summary
}
