//! Release backend clients
//!
//! The backend owns the actual releases in the cluster. Deckhand supports:
//! - **Helm CLI** (default): Drives a `helm` v3 binary
//! - **Mock**: In-memory releases for testing
//!
//! "Release not found" is reported as [`BackendError::NotFound`]; callers
//! never inspect error text.

mod helm;
mod mock;

pub use helm::{HelmCli, parse_helm_status};
pub use mock::{BackendOperationCounts, MockReleaseBackend};

use async_trait::async_trait;
use deckhand_core::{Chart, ReleaseStatusCode};
use std::time::Duration;
use thiserror::Error;

/// Default timeout for backend operations (5 minutes)
pub const DEFAULT_BACKEND_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors returned by a release backend
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BackendError {
    /// The release does not exist in the backend
    #[error("release '{name}' not found")]
    NotFound { name: String },

    /// The backend rejected or failed the operation
    #[error("{operation} failed: {message}")]
    Operation { operation: String, message: String },

    /// The backend answered with something we could not read
    #[error("unexpected backend response: {0}")]
    InvalidResponse(String),

    /// The backend did not answer in time
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
    }
}

/// Result type for backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Options for install operation
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Allow reusing the name of a deleted release
    pub reuse_name: bool,

    /// Values overriding the chart defaults
    pub values: serde_json::Value,

    /// Timeout for the operation
    pub timeout: Duration,
}

impl InstallOptions {
    /// Create install options with name and namespace
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            reuse_name: false,
            values: serde_json::Value::Object(serde_json::Map::new()),
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Allow reusing a deleted release's name
    pub fn with_reuse_name(mut self) -> Self {
        self.reuse_name = true;
        self
    }

    /// Set value overrides
    pub fn with_values(mut self, values: serde_json::Value) -> Self {
        self.values = values;
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Options for upgrade operation
#[derive(Debug, Clone)]
pub struct UpgradeOptions {
    /// Values overriding the chart defaults
    pub values: serde_json::Value,

    /// Timeout for the operation
    pub timeout: Duration,
}

impl UpgradeOptions {
    pub fn new(values: serde_json::Value) -> Self {
        Self {
            values,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Options for rollback operation
#[derive(Debug, Clone)]
pub struct RollbackOptions {
    /// Revision to roll back to (`None` = previous)
    pub revision: Option<u32>,

    /// Timeout for the operation
    pub timeout: Duration,
}

impl Default for RollbackOptions {
    fn default() -> Self {
        Self {
            revision: None,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }
}

impl RollbackOptions {
    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Options for delete operation
#[derive(Debug, Clone)]
pub struct DeleteOptions {
    /// Drop the release history instead of keeping a DELETED record
    pub purge: bool,

    /// Timeout for the operation
    pub timeout: Duration,
}

impl Default for DeleteOptions {
    fn default() -> Self {
        Self {
            purge: false,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }
}

impl DeleteOptions {
    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Client for the release-management backend
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ReleaseBackend: Send + Sync {
    /// Current status code of a release
    async fn status(&self, name: &str) -> BackendResult<ReleaseStatusCode>;

    /// Install a chart as a new release
    async fn install(&self, chart: &Chart, options: &InstallOptions) -> BackendResult<()>;

    /// Upgrade an existing release to a chart
    async fn upgrade(&self, name: &str, chart: &Chart, options: &UpgradeOptions)
    -> BackendResult<()>;

    /// Roll a release back
    async fn rollback(&self, name: &str, options: &RollbackOptions) -> BackendResult<()>;

    /// Delete a release
    async fn delete(&self, name: &str, options: &DeleteOptions) -> BackendResult<()>;
}
