//! Error types for chart downloading

use thiserror::Error;

/// Chart download errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Reference Errors ============
    #[error("Invalid chart repository URL: {url} - {reason}")]
    InvalidRepositoryUrl { url: String, reason: String },

    #[error("Unsupported chart repository {url} (no downloader for scheme '{scheme}')")]
    UnsupportedScheme { scheme: String, url: String },

    // ============ Transport Errors ============
    #[error("Object storage error for s3://{bucket}/{key}: {message}")]
    ObjectStore {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Download timeout after {seconds}s")]
    Timeout { seconds: u64 },

    // ============ Chart Errors ============
    #[error("Chart not found: {name}@{version}")]
    ChartNotFound { name: String, version: String },

    #[error("Failed to load chart {name}@{version}: {source}")]
    InvalidChart {
        name: String,
        version: String,
        #[source]
        source: deckhand_core::CoreError,
    },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for chart download operations
pub type Result<T> = std::result::Result<T, RepoError>;

impl From<reqwest::Error> for RepoError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout { seconds: 30 }
        } else if e.is_connect() {
            RepoError::NetworkError {
                message: format!("Connection failed: {}", e),
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            RepoError::NetworkError {
                message: e.to_string(),
            }
        }
    }
}
