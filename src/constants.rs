// Unload document format
pub const ENVELOPE_TAG: &str = "unload";
pub const UNLOAD_DATE_ATTR: &str = "unload_date";
pub const DISPLAY_VALUE_ATTR: &str = "display_value";

// Instance API
pub const UNLOAD_QUERY: &str = "XML&useUnloadFormat=true";
pub const XML_ACCEPT_HEADER: &str = "application/xhtml+xml, application/xml";
pub const XML_CONTENT_TYPES: &[&str] = &["text/xml", "application/xml"];

// Backup naming
pub const BACKUP_DIR_PREFIX: &str = "snbackup";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const TABLE_NAME_PATTERN: &str = r"^[A-Za-z0-9_]+$";

// Tables backed up by a bare `--backup`
pub const DEFAULT_TABLES: &str = "cmdb_ci_storage_server,u_cmdb_ci_wan,cmdb_rel_ci,sys_user";

pub const DEFAULT_CONFIG_FILE: &str = "servicenow-backup.toml";
