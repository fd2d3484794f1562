use crate::constants::TABLE_NAME_PATTERN;
use crate::errors::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;

/// Cached regex for validating table names.
/// Compiled once at initialization for performance.
static TABLE_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

/// Validates a single table name.
///
/// Table names end up both in the request URL and in the backup file name,
/// so only ASCII letters, digits and underscores are accepted.
pub fn validate_table_name(table: &str) -> AppResult<()> {
    let regex = TABLE_NAME_REGEX.get_or_init(|| {
        Regex::new(TABLE_NAME_PATTERN).expect("TABLE_NAME_PATTERN is a valid regex pattern")
    });
    if regex.is_match(table) {
        Ok(())
    } else {
        Err(AppError::InvalidInput(format!(
            "Invalid table name '{table}': only letters, digits and '_' are allowed"
        )))
    }
}

/// Splits a comma-separated table list.
///
/// Entries are trimmed and empty entries dropped; order is kept.
///
/// # Errors
///
/// Returns `InvalidInput` if the list is empty or any name is invalid.
pub fn parse_table_list(input: &str) -> AppResult<Vec<String>> {
    let tables: Vec<String> = input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();

    if tables.is_empty() {
        return Err(AppError::InvalidInput(
            "No table names given for backup".to_string(),
        ));
    }
    for table in &tables {
        validate_table_name(table)?;
    }
    Ok(tables)
}
