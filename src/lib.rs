//! sn-backup library
//!
//! This crate provides the core functionality for the `sn-backup` binary.
//! Implementation and tests live in their modules.
//!
//! ## Overview
//!
//! - [`downloader`] - Downloads tables from a ServiceNow instance as gzip-compressed unload XML
//! - [`converter`] - Streams unload XML dumps into CSV files with bounded memory
//! - [`cli`] - Command-line interface combining backup and conversion
//! - [`config`] - Instance configuration loaded from a TOML file
//! - [`models`] - Rows, fields and the value selection mode
//! - [`errors`] - Error types used throughout the application
//!
//! ## Example Usage
//!
//! Converting a dump to CSV, preferring display values:
//!
//! ```no_run
//! use sn_backup::{converter::DumpConverter, errors::AppResult, models::ValueMode};
//! use std::path::Path;
//!
//! # fn main() -> AppResult<()> {
//! let mut converter = DumpConverter::new(ValueMode::Display);
//! let csv = converter.convert_file(Path::new("incident.xml.gz"))?;
//! println!("{} rows -> {:?}", converter.rows(), csv);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod converter;
pub mod downloader;
pub mod errors;
pub mod logging;
pub mod models;
pub mod utils;
