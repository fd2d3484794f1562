use crate::config::InstanceConfig;
use crate::constants::{UNLOAD_QUERY, XML_ACCEPT_HEADER, XML_CONTENT_TYPES};
use crate::errors::{AppError, AppResult};
use crate::utils::size_mb;
use flate2::write::GzEncoder;
use flate2::Compression;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

/// Builds the HTTP client used for a backup run.
pub fn build_client(config: &InstanceConfig) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| AppError::NetworkError(format!("Failed to build HTTP client: {e}")))
}

/// Unload export URL of `table`: `<scheme>://<instance>/<table>.do?XML&useUnloadFormat=true`.
pub fn table_url(config: &InstanceConfig, table: &str) -> AppResult<Url> {
    let base = Url::parse(&format!("{}://{}/", config.scheme, config.instance))?;
    let mut url = base.join(&format!("{table}.do"))?;
    url.set_query(Some(UNLOAD_QUERY));
    Ok(url)
}

/// `<table>.xml.gz`, or `<table> <timestamp>.xml.gz` when a timestamp is given.
pub fn backup_file_name(table: &str, timestamp: Option<&str>) -> String {
    match timestamp {
        Some(ts) => format!("{table} {ts}.xml.gz"),
        None => format!("{table}.xml.gz"),
    }
}

fn is_xml_content_type(value: &str) -> bool {
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    XML_CONTENT_TYPES.contains(&essence.as_str())
}

/// Classifies a response before its body is read.
///
/// 401 is an authentication failure; any other status than 200, or a body
/// that is not declared as XML, is a response failure.
pub(crate) fn check_response(
    status: StatusCode,
    content_type: Option<&str>,
    instance: &str,
    table: &str,
) -> AppResult<()> {
    if status == StatusCode::UNAUTHORIZED {
        return Err(AppError::AuthenticationError {
            instance: instance.to_string(),
        });
    }
    if status != StatusCode::OK {
        return Err(AppError::ResponseError(format!(
            "HTTP {} for table {table}",
            status.as_u16()
        )));
    }
    match content_type {
        Some(ct) if is_xml_content_type(ct) => Ok(()),
        other => Err(AppError::ResponseError(format!(
            "HTTP {} for table {table} with content type '{}', expected XML",
            status.as_u16(),
            other.unwrap_or("none")
        ))),
    }
}

/// Downloads one table as an unload XML dump, gzip-compressed on disk.
///
/// The body is streamed through the compressor into `<file>.part`, which is
/// renamed to the final name once complete and removed if the transfer fails.
///
/// # Arguments
///
/// * `client` - HTTP client from [`build_client`]
/// * `config` - Instance, credentials and scheme
/// * `table` - Table name, e.g. `incident`
/// * `dir` - Directory the dump is written to
/// * `timestamp` - Timestamp embedded in the file name, if any
///
/// # Errors
///
/// - `AuthenticationError` on HTTP 401
/// - `ResponseError` on any other non-200 status or a non-XML content type
/// - `NetworkError` when the connection fails, times out or breaks mid-body
/// - `IoError` when the dump cannot be written
pub async fn download_table(
    client: &reqwest::Client,
    config: &InstanceConfig,
    table: &str,
    dir: &Path,
    timestamp: Option<&str>,
) -> AppResult<PathBuf> {
    let filename = backup_file_name(table, timestamp);
    let file_path = dir.join(&filename);
    let tmp_path = dir.join(format!("{filename}.part"));
    let url = table_url(config, table)?;

    info!(table = table, url = %url, "Downloading table");

    let response = client
        .get(url)
        .header(ACCEPT, XML_ACCEPT_HEADER)
        .basic_auth(&config.username, Some(&config.password))
        .send()
        .await
        .map_err(|e| AppError::NetworkError(format!("Failed to download {table}: {e}")))?;

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    check_response(
        response.status(),
        content_type.as_deref(),
        &config.instance,
        table,
    )?;

    let bytes = match write_compressed(response, &tmp_path, table).await {
        Ok(bytes) => bytes,
        Err(e) => {
            if let Err(remove_err) = fs::remove_file(&tmp_path).await {
                warn!(
                    file_path = %tmp_path.display(),
                    error = %remove_err,
                    "Failed to remove partial download"
                );
            }
            return Err(e);
        }
    };

    fs::rename(&tmp_path, &file_path).await.map_err(|e| {
        AppError::IoError(format!(
            "Failed to rename temp file {} to {}: {}",
            tmp_path.display(),
            file_path.display(),
            e
        ))
    })?;

    info!(
        table = table,
        file = %file_path.display(),
        size_mb = size_mb(bytes),
        "Table saved"
    );

    Ok(file_path)
}

/// Streams the response body through a gzip encoder into `tmp_path`.
/// Returns the number of uncompressed bytes received.
///
/// Each chunk is compressed in memory and the compressed bytes are written
/// through `tokio::fs`, so no blocking file I/O runs on the runtime.
async fn write_compressed(
    mut response: reqwest::Response,
    tmp_path: &Path,
    table: &str,
) -> AppResult<u64> {
    let mut file = File::create(tmp_path).await.map_err(|e| {
        AppError::IoError(format!(
            "Failed to create temp file {}: {}",
            tmp_path.display(),
            e
        ))
    })?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut bytes: u64 = 0;

    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| AppError::NetworkError(format!("Failed to read body of {table}: {e}")))?
    {
        encoder.write_all(&chunk)?;
        bytes += chunk.len() as u64;

        let compressed = encoder.get_mut();
        if !compressed.is_empty() {
            write_to_file(&mut file, compressed, tmp_path).await?;
            compressed.clear();
        }
    }

    let tail = encoder.finish()?;
    write_to_file(&mut file, &tail, tmp_path).await?;
    file.flush().await?;
    debug!(table = table, bytes = bytes, "Response body received");

    Ok(bytes)
}

async fn write_to_file(file: &mut File, data: &[u8], tmp_path: &Path) -> AppResult<()> {
    file.write_all(data).await.map_err(|e| {
        AppError::IoError(format!(
            "Failed to write to temp file {}: {}",
            tmp_path.display(),
            e
        ))
    })
}
