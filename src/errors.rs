use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// Source unreadable or destination unwritable
    #[error("I/O error: {0}")]
    IoError(String),
    /// Dump content is not a well-formed unload document
    #[error("Parse error: {0}")]
    ParseError(String),
    /// The instance rejected the credentials (HTTP 401)
    #[error("Authorization denied (401) by instance {instance}")]
    AuthenticationError { instance: String },
    /// Unexpected status code or content type from the instance
    #[error("Wrong HTTP response from instance: {0}")]
    ResponseError(String),
    /// Connection, timeout or body transfer failure
    #[error("Unable to connect to instance: {0}")]
    NetworkError(String),
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    UrlError(String),
    /// Invalid input format
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// One or more files of a conversion batch failed
    #[error("{failed} of {total} file(s) failed to convert")]
    ConversionFailed { failed: usize, total: usize },
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::NetworkError(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::UrlError(err.to_string())
    }
}

impl From<quick_xml::Error> for AppError {
    fn from(err: quick_xml::Error) -> Self {
        match err {
            quick_xml::Error::Io(io) => AppError::IoError(io.to_string()),
            other => AppError::ParseError(other.to_string()),
        }
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<regex::Error> for AppError {
    fn from(err: regex::Error) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

// Custom type alias for Results in this application
pub type AppResult<T> = Result<T, AppError>;
