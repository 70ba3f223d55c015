//! Common error types for the negotiator

use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// The backend could not be reached at all
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A single attempt exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The backend answered but not in the shape we expected
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The backend rejected the request body
    #[error("Backend rejected request ({status}): {message}")]
    SchemaRejection { status: u16, message: String },

    #[error("Backend returned no images")]
    EmptyResult,

    #[error("Unrecognized image format: {0}")]
    Format(String),

    #[error("Image download failed: {0}")]
    Download(String),

    #[error("No request variant accepted after {attempts} attempts across {endpoints} endpoints{}", last_error_suffix(.last_error))]
    Exhausted {
        endpoints: usize,
        attempts: usize,
        last_error: Option<String>,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Build a transport-level error from a reqwest failure, keeping the
    /// connect/timeout distinction the negotiation engine relies on.
    pub fn from_transport(target: &str, err: reqwest::Error) -> Self {
        if err.is_connect() {
            AppError::Connection(format!("{}: {}", target, err))
        } else if err.is_timeout() {
            AppError::Timeout(format!("{}: {}", target, err))
        } else {
            AppError::HttpClient(err)
        }
    }
}

fn last_error_suffix(last_error: &Option<String>) -> String {
    last_error
        .as_ref()
        .map(|e| format!(" (last error: {})", e))
        .unwrap_or_default()
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
