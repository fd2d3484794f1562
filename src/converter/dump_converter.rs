use super::csv_writer::TableCsvWriter;
use super::dump_reader::DumpReader;
use super::source::{csv_path_for, open_dump, part_path_for};
use crate::errors::{AppError, AppResult};
use crate::models::ValueMode;
use std::fs::{self, File};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Converts one table dump at a time into CSV.
///
/// The row counter survives a failed conversion so callers can always
/// report how far a file got.
pub struct DumpConverter {
    mode: ValueMode,
    rows: u64,
}

impl DumpConverter {
    pub fn new(mode: ValueMode) -> Self {
        Self { mode, rows: 0 }
    }

    /// Rows seen by the last conversion.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Streams `input` into CSV.
    ///
    /// `open_output` is only called when the first row is complete, so a dump
    /// without rows never creates an output. Returns the finished output, or
    /// `None` when the dump had no rows.
    pub fn convert<R, W, F>(&mut self, input: R, open_output: F) -> AppResult<Option<W>>
    where
        R: BufRead,
        W: Write,
        F: FnOnce() -> AppResult<W>,
    {
        self.rows = 0;
        let mut reader = DumpReader::new(input, self.mode);
        let mut open_output = Some(open_output);
        let mut writer: Option<TableCsvWriter<W>> = None;

        loop {
            let next = reader.next_row();
            self.rows = reader.rows_read();
            let Some(row) = next? else {
                break;
            };

            if let Some(writer) = writer.as_mut() {
                writer.write_row(&row)?;
                continue;
            }
            if let Some(open) = open_output.take() {
                debug!(
                    table = %row.table,
                    unload_date = reader.unload_date().unwrap_or("unknown"),
                    "Discovered table schema"
                );
                writer = Some(TableCsvWriter::from_first_row(open()?, &row)?);
            }
        }

        writer.map(TableCsvWriter::finish).transpose()
    }

    /// Converts the dump at `source` into a CSV file next to it.
    ///
    /// The CSV is written as `<name>.csv.part` and renamed once complete; on
    /// failure the partial file is removed. Returns the CSV path, or `None`
    /// when the dump had no rows and no file was written.
    ///
    /// # Errors
    ///
    /// Returns `IoError` when the dump cannot be read or the CSV cannot be
    /// written, and `ParseError` for malformed dumps.
    pub fn convert_file(&mut self, source: &Path) -> AppResult<Option<PathBuf>> {
        self.rows = 0;
        let output = csv_path_for(source)?;
        let part = part_path_for(&output);
        let input = open_dump(source)?;

        let result = self.convert(input, || {
            info!(output = %output.display(), "Opening");
            File::create(&part).map_err(|e| {
                AppError::IoError(format!("Failed to create {}: {e}", part.display()))
            })
        });

        match result {
            Ok(Some(mut file)) => {
                file.flush()?;
                drop(file);
                fs::rename(&part, &output).map_err(|e| {
                    AppError::IoError(format!(
                        "Failed to rename {} to {}: {e}",
                        part.display(),
                        output.display()
                    ))
                })?;
                Ok(Some(output))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                if part.exists() {
                    if let Err(remove_err) = fs::remove_file(&part) {
                        warn!(
                            file_path = %part.display(),
                            error = %remove_err,
                            "Failed to remove partial CSV file"
                        );
                    }
                }
                Err(e)
            }
        }
    }
}
