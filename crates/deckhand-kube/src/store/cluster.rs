//! Kubernetes API resource store
//!
//! Finalizer changes go through a full `replace`, so a stale read fails
//! with a conflict instead of overwriting someone else's write. Status is
//! written with server-side apply, which drops condition fields that are
//! no longer set.

use async_trait::async_trait;
use deckhand_core::{HelmRelease, ResourceKey};
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, Resource, ResourceExt};

use super::{ResourceStore, StoreError, StoreResult};

/// Field manager used for status writes
pub const FIELD_MANAGER: &str = "deckhand";

/// Resource store backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeResourceStore {
    client: Client,
}

impl KubeResourceStore {
    /// Create with an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Get the HelmRelease API for a namespace
    fn api(&self, namespace: &str) -> Api<HelmRelease> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn map_error(key: &ResourceKey, err: kube::Error) -> StoreError {
        match err {
            kube::Error::Api(e) if e.code == 404 => StoreError::NotFound { key: key.clone() },
            kube::Error::Api(e) if e.code == 409 => StoreError::Conflict { key: key.clone() },
            other => StoreError::Api(other),
        }
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn get(&self, key: &ResourceKey) -> StoreResult<HelmRelease> {
        self.api(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| Self::map_error(key, e))
    }

    async fn update(&self, release: &HelmRelease) -> StoreResult<HelmRelease> {
        let key = release.key();
        self.api(&key.namespace)
            .replace(&release.name_any(), &PostParams::default(), release)
            .await
            .map_err(|e| Self::map_error(&key, e))
    }

    async fn update_status(&self, release: &HelmRelease) -> StoreResult<HelmRelease> {
        let key = release.key();
        let patch = serde_json::json!({
            "apiVersion": HelmRelease::api_version(&()),
            "kind": HelmRelease::kind(&()),
            "status": release.status,
        });

        self.api(&key.namespace)
            .patch_status(
                &release.name_any(),
                &PatchParams::apply(FIELD_MANAGER).force(),
                &Patch::Apply(&patch),
            )
            .await
            .map_err(|e| Self::map_error(&key, e))
    }
}
