use crate::errors::{AppError, AppResult};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings for one instance, resolved from the config file.
///
/// Passed explicitly to the downloader; all fields hold concrete values.
#[derive(Clone)]
pub struct InstanceConfig {
    /// Host name of the instance, e.g. `dev12345.service-now.com`
    pub instance: String,
    pub username: String,
    pub password: String,
    /// URL scheme used to reach the instance
    pub scheme: String,
    /// Whole-request timeout
    pub timeout: Duration,
    /// Directory the `snbackup_*` directories are created in
    pub backup_root: PathBuf,
}

impl fmt::Debug for InstanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceConfig")
            .field("instance", &self.instance)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("scheme", &self.scheme)
            .field("timeout", &self.timeout)
            .field("backup_root", &self.backup_root)
            .finish()
    }
}

/// Config file as written by the operator.
///
/// Required keys are optional here so that every missing one can be
/// reported at once.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct InstanceConfigFile {
    instance: Option<String>,
    username: Option<String>,
    password: Option<String>,
    #[serde(default = "default_scheme")]
    scheme: String,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_backup_root")]
    backup_root: PathBuf,
}

fn default_scheme() -> String {
    "https".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_backup_root() -> PathBuf {
    PathBuf::from(".")
}

fn required(value: Option<String>, key: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => {
            missing.push(key);
            String::new()
        }
    }
}

impl InstanceConfig {
    /// Loads and validates the instance configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read, the TOML is malformed,
    /// unknown keys are present, any of `instance`, `username` or `password`
    /// is missing or empty, or `timeout_secs` is zero.
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            AppError::ConfigError(msg) => {
                AppError::ConfigError(format!("{msg} (in {})", path.display()))
            }
            other => other,
        })
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        let file: InstanceConfigFile = toml::from_str(contents)
            .map_err(|e| AppError::ConfigError(format!("Failed to parse config: {e}")))?;

        let mut missing = Vec::new();
        let instance = required(file.instance, "instance", &mut missing);
        let username = required(file.username, "username", &mut missing);
        let password = required(file.password, "password", &mut missing);
        if !missing.is_empty() {
            return Err(AppError::ConfigError(format!(
                "Missing required setting(s): {}",
                missing.join(", ")
            )));
        }

        if file.timeout_secs == 0 {
            return Err(AppError::ConfigError(
                "timeout_secs must be greater than 0".into(),
            ));
        }
        if file.scheme != "https" && file.scheme != "http" {
            return Err(AppError::ConfigError(format!(
                "Unsupported scheme '{}', expected https or http",
                file.scheme
            )));
        }

        Ok(Self {
            instance: instance.trim().to_string(),
            username,
            password,
            scheme: file.scheme,
            timeout: Duration::from_secs(file.timeout_secs),
            backup_root: file.backup_root,
        })
    }
}
