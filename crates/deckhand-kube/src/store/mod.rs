//! Resource stores for `HelmRelease` objects
//!
//! - **Kubernetes** (default): The API server, through `Api<HelmRelease>`
//! - **Mock**: In-memory objects for testing
//!
//! Writes are whole-object: metadata and spec through [`ResourceStore::update`],
//! status through [`ResourceStore::update_status`].

mod cluster;
mod mock;

pub use cluster::KubeResourceStore;
pub use mock::{MockResourceStore, StoreOperationCounts};

use async_trait::async_trait;
use deckhand_core::{HelmRelease, ResourceKey};
use thiserror::Error;

/// Errors returned by a resource store
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The resource does not exist
    #[error("HelmRelease {key} not found")]
    NotFound { key: ResourceKey },

    /// The resource changed since it was read
    #[error("HelmRelease {key} was modified concurrently")]
    Conflict { key: ResourceKey },

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Api(#[from] kube::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Read and persist `HelmRelease` objects
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch a resource by key
    async fn get(&self, key: &ResourceKey) -> StoreResult<HelmRelease>;

    /// Persist metadata (finalizers) and spec; returns the stored object
    async fn update(&self, release: &HelmRelease) -> StoreResult<HelmRelease>;

    /// Persist the status; returns the stored object
    async fn update_status(&self, release: &HelmRelease) -> StoreResult<HelmRelease>;
}
