use crate::errors::{AppError, AppResult};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.to_ascii_lowercase().ends_with(suffix))
        .unwrap_or(false)
}

/// Returns `true` when the dump is gzip-compressed (name ends in `.gz`).
pub fn is_compressed(path: &Path) -> bool {
    has_suffix(path, ".gz")
}

/// Returns `true` for files `--convert` picks up when given a directory.
pub fn is_dump_file(path: &Path) -> bool {
    has_suffix(path, ".xml") || has_suffix(path, ".xml.gz")
}

/// Maps a dump path to its CSV path.
///
/// `table.xml.gz` and `table.xml` both become `table.csv`; any other
/// extension is replaced by `csv`.
///
/// # Errors
///
/// Returns `InvalidInput` if the source has no file name or already is the
/// CSV path it would be converted to.
pub fn csv_path_for(source: &Path) -> AppResult<PathBuf> {
    if source.file_name().is_none() {
        return Err(AppError::InvalidInput(format!(
            "Not a dump file path: {}",
            source.display()
        )));
    }

    let mut stem = source.to_path_buf();
    if is_compressed(&stem) {
        stem.set_extension("");
    }
    let output = if has_suffix(&stem, ".xml") {
        stem.set_extension("");
        let mut name = stem.into_os_string();
        name.push(".csv");
        PathBuf::from(name)
    } else {
        stem.with_extension("csv")
    };

    if output == source {
        return Err(AppError::InvalidInput(format!(
            "Refusing to overwrite source file {}",
            source.display()
        )));
    }
    Ok(output)
}

/// Temporary name the CSV is written under until the conversion succeeds.
pub(crate) fn part_path_for(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Opens a dump for streaming, gunzipping it when the name ends in `.gz`.
pub fn open_dump(path: &Path) -> AppResult<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| {
        AppError::IoError(format!("Failed to open dump {}: {e}", path.display()))
    })?;

    if is_compressed(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Expands the paths given on the command line.
///
/// Directories are walked recursively and contribute their `.xml` and
/// `.xml.gz` files in sorted order; every other path is kept as is so that
/// missing files are reported by the conversion itself. Entries that cannot
/// be read while walking are logged and skipped.
pub fn find_dumps(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut out = Vec::with_capacity(paths.len());
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| match entry {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!(
                            path = %e.path().unwrap_or(path.as_path()).display(),
                            error = %e,
                            "Skipping unreadable entry"
                        );
                        None
                    }
                })
                .filter(|entry| entry.file_type().is_file() && is_dump_file(entry.path()))
                .map(|entry| entry.path().to_path_buf())
                .collect();
            found.sort();
            out.extend(found);
        } else {
            out.push(path.clone());
        }
    }
    out
}
