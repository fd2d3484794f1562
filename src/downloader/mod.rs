//! Table backups from a ServiceNow instance.
//!
//! Each table is fetched as an unload XML document and stored gzip-compressed.
//! The main entry point is [`backup_tables`]; a failure of any table aborts
//! the whole run.

mod backup;
mod table_downloader;
mod table_list;

// Re-export public API
pub use backup::backup_tables;
pub use table_downloader::{backup_file_name, build_client, download_table, table_url};
pub use table_list::{parse_table_list, validate_table_name};
