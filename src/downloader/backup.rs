use super::table_downloader::{build_client, download_table};
use crate::config::InstanceConfig;
use crate::constants::BACKUP_DIR_PREFIX;
use crate::errors::{AppError, AppResult};
use crate::utils::{format_elapsed, timestamp_now};
use std::path::PathBuf;
use std::time::Instant;
use tokio::fs;
use tracing::info;

/// Backs up `tables` into a fresh `snbackup_<instance>_<timestamp>` directory.
///
/// Tables are downloaded one after the other. The first failure ends the
/// run and is returned as is; tables already saved stay on disk.
///
/// # Arguments
///
/// * `config` - Instance and credentials
/// * `tables` - Validated table names (see [`super::parse_table_list`])
/// * `timestamp_names` - Whether each file name carries a download timestamp
///
/// # Returns
///
/// The backup directory.
pub async fn backup_tables(
    config: &InstanceConfig,
    tables: &[String],
    timestamp_names: bool,
) -> AppResult<PathBuf> {
    let client = build_client(config)?;
    let backup_dir = config.backup_root.join(format!(
        "{BACKUP_DIR_PREFIX}_{}_{}",
        config.instance,
        timestamp_now()
    ));

    fs::create_dir_all(&backup_dir).await.map_err(|e| {
        AppError::IoError(format!(
            "Failed to create backup directory {}: {e}",
            backup_dir.display()
        ))
    })?;

    info!(
        instance = %config.instance,
        tables = tables.len(),
        backup_dir = %backup_dir.display(),
        "Starting backup"
    );
    let start = Instant::now();

    for table in tables {
        let timestamp = timestamp_names.then(timestamp_now);
        download_table(&client, config, table, &backup_dir, timestamp.as_deref()).await?;
    }

    info!(
        tables = tables.len(),
        backup_dir = %backup_dir.display(),
        elapsed = %format_elapsed(start.elapsed()),
        "Backup completed"
    );

    Ok(backup_dir)
}
