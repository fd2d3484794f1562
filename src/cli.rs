use crate::config::InstanceConfig;
use crate::constants::{DEFAULT_CONFIG_FILE, DEFAULT_TABLES};
use crate::converter::convert_files;
use crate::downloader::{backup_tables, parse_table_list};
use crate::errors::{AppError, AppResult};
use crate::logging::init_logging;
use crate::models::ValueMode;
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tracing::{info, warn};

// CLI metadata constants
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
const APP_ABOUT: &str = env!("CARGO_PKG_DESCRIPTION");

/// Options resolved from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliOptions {
    /// Comma-separated tables to back up, if a backup was requested
    pub backup: Option<String>,
    /// Embed a timestamp in backup file names
    pub timestamp: bool,
    /// Dump files or directories to convert
    pub convert: Vec<PathBuf>,
    /// Prefer display values over raw values in CSV output
    pub display_value: bool,
    pub verbosity: u8,
    pub config_path: PathBuf,
}

impl CliOptions {
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            backup: matches.get_one::<String>("backup").cloned(),
            timestamp: !matches.get_flag("no_timestamp"),
            convert: matches
                .get_many::<PathBuf>("convert")
                .map(|paths| paths.cloned().collect())
                .unwrap_or_default(),
            display_value: matches.get_flag("display_value"),
            verbosity: matches.get_one::<u8>("verbosity").copied().unwrap_or(0),
            config_path: matches
                .get_one::<PathBuf>("config")
                .cloned()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
        }
    }

    /// `true` when at least one of backup and convert was requested.
    pub fn has_action(&self) -> bool {
        self.backup.is_some() || !self.convert.is_empty()
    }
}

pub(crate) fn build_command() -> Command {
    Command::new("sn-backup")
        .version(APP_VERSION)
        .author(APP_AUTHOR)
        .about(APP_ABOUT)
        .after_help(
            "Backup runs before conversion when both are given.\nExamples:\n  sn-backup --backup incident,sys_user --no-timestamp\n  sn-backup --convert dumps/ --display-value",
        )
        .arg(
            Arg::new("backup")
                .short('b')
                .long("backup")
                .value_name("TABLES")
                .help("Back up a comma-separated list of tables (default list when no value is given)")
                .num_args(0..=1)
                .default_missing_value(DEFAULT_TABLES)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("timestamp")
                .long("timestamp")
                .help("Put a timestamp in backup file names (default)")
                .overrides_with("no_timestamp")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no_timestamp")
                .long("no-timestamp")
                .alias("notimestamp")
                .help("Do not put a timestamp in backup file names")
                .overrides_with("timestamp")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("convert")
                .short('c')
                .long("convert")
                .value_name("FILES")
                .help("Convert table dump file(s) or directories from XML to CSV")
                .num_args(1..)
                .value_parser(clap::value_parser!(PathBuf))
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("display_value")
                .short('d')
                .long("display-value")
                .alias("displayvalue")
                .help("Use display values instead of raw values (e.g. sys_ids) in CSV files")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbosity")
                .short('v')
                .long("verbosity")
                .help("Log level: 0 = info, 1 = debug, 2 = trace")
                .value_parser(clap::value_parser!(u8).range(0..=2))
                .default_value("0")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Instance configuration file")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value(DEFAULT_CONFIG_FILE)
                .action(ArgAction::Set),
        )
}

/// Parses command-line arguments and runs the requested actions.
///
/// Two actions can be combined in one invocation:
/// 1. `--backup`: downloads each table as a gzip-compressed unload dump.
///    Any failure ends the run.
/// 2. `--convert`: converts dump files to CSV. A failing file is reported
///    and the remaining files are still converted.
///
/// # Returns
///
/// Returns an error if neither action was requested (after printing help),
/// if the configuration is missing or incomplete when backing up, if any
/// table download fails, or if any file failed to convert.
pub async fn cli() -> AppResult<()> {
    let cmd = build_command();
    let mut cmd_for_help = cmd.clone();
    let matches = cmd.get_matches();
    let options = CliOptions::from_matches(&matches);

    init_logging(options.verbosity);

    if !options.has_action() {
        cmd_for_help
            .print_help()
            .map_err(|e| AppError::IoError(format!("Failed to print help: {e}")))?;
        return Err(AppError::InvalidInput(
            "Nothing to do, pass --backup and/or --convert".into(),
        ));
    }

    run(&options).await
}

/// Runs the actions in `options`: backup first, then conversion.
pub async fn run(options: &CliOptions) -> AppResult<()> {
    // Table names and configuration are checked before any network or file activity.
    let backup = match &options.backup {
        Some(list) => {
            let tables = parse_table_list(list)?;
            let config = InstanceConfig::from_toml_file(&options.config_path)?;
            Some((config, tables))
        }
        None => None,
    };

    if let Some((config, tables)) = backup {
        let backup_dir = backup_tables(&config, &tables, options.timestamp).await?;
        info!(backup_dir = %backup_dir.display(), "Tables backed up");
    }

    if !options.convert.is_empty() {
        run_conversion(
            options.convert.clone(),
            ValueMode::from(options.display_value),
        )
        .await?;
    }

    Ok(())
}

async fn run_conversion(paths: Vec<PathBuf>, mode: ValueMode) -> AppResult<()> {
    let summary = tokio::task::spawn_blocking(move || convert_files(&paths, mode))
        .await
        .map_err(|e| AppError::IoError(format!("Task join error: {e}")))?;

    if summary.is_success() {
        return Ok(());
    }

    for (file, error) in &summary.failed {
        warn!(file = %file.display(), error = %error, "Not converted");
    }
    Err(AppError::ConversionFailed {
        failed: summary.failed.len(),
        total: summary.total(),
    })
}
