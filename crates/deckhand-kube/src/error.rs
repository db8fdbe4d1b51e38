//! Error types for deckhand-kube

use deckhand_core::{ReleaseStatusCode, ResourceKey};
use deckhand_repo::RepoError;
use thiserror::Error;

use crate::backend::BackendError;
use crate::store::StoreError;

/// Result type for reconcile passes
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Errors that end a reconcile pass and trigger a backoff retry
///
/// Every variant carries the operation and the object or release it was
/// working on.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReconcileError {
    /// Reading the resource failed for a reason other than not-found
    #[error("failed to fetch HelmRelease {key}: {source}")]
    Fetch {
        key: ResourceKey,
        #[source]
        source: StoreError,
    },

    /// Writing the resource or its status failed
    #[error("failed to {operation} for release '{release}': {source}")]
    Persist {
        operation: &'static str,
        release: String,
        #[source]
        source: StoreError,
    },

    /// Querying the backend status failed
    #[error("failed to get status of release '{release}': {source}")]
    Status {
        release: String,
        #[source]
        source: BackendError,
    },

    /// A backend mutation failed
    #[error("failed to {operation} release '{release}': {source}")]
    Backend {
        operation: &'static str,
        release: String,
        #[source]
        source: BackendError,
    },

    /// The chart could not be downloaded or loaded
    #[error("failed to download chart for release '{release}': {source}")]
    Download {
        release: String,
        #[source]
        source: RepoError,
    },

    /// The backend reported a status the controller has no action for
    #[error("unhandled status code {status} for release '{release}'")]
    UnhandledStatus {
        release: String,
        status: ReleaseStatusCode,
    },
}

impl ReconcileError {
    /// Operation name, for logs and metrics labels
    pub fn operation(&self) -> &'static str {
        match self {
            ReconcileError::Fetch { .. } => "fetch",
            ReconcileError::Persist { operation, .. } => operation,
            ReconcileError::Status { .. } => "status",
            ReconcileError::Backend { operation, .. } => operation,
            ReconcileError::Download { .. } => "download",
            ReconcileError::UnhandledStatus { .. } => "classify",
        }
    }
}
