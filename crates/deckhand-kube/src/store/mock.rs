//! Mock resource store for testing
//!
//! Stores objects in memory and mirrors the API-server behaviour the
//! controller relies on: `update` does not touch status, `update_status`
//! touches nothing else, and an object marked for deletion disappears once
//! its last finalizer is removed.

use async_trait::async_trait;
use deckhand_core::{HelmRelease, ResourceKey};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{ResourceStore, StoreError, StoreResult};

/// In-memory resource store for testing
#[derive(Clone, Default)]
pub struct MockResourceStore {
    objects: Arc<RwLock<HashMap<ResourceKey, HelmRelease>>>,
    /// Track operation counts for assertions
    operations: Arc<RwLock<StoreOperationCounts>>,
    /// Next `get` fails with this message
    fail_next_get: Arc<RwLock<Option<String>>>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StoreOperationCounts {
    pub gets: usize,
    pub updates: usize,
    pub status_updates: usize,
}

impl MockResourceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with pre-populated objects
    pub fn with_releases(releases: Vec<HelmRelease>) -> Self {
        let store = Self::new();
        for release in releases {
            store.insert(release);
        }
        store
    }

    /// Insert or overwrite an object, as a user would
    pub fn insert(&self, release: HelmRelease) {
        self.objects
            .write()
            .unwrap()
            .insert(release.key(), release);
    }

    /// Current stored object
    pub fn stored(&self, key: &ResourceKey) -> Option<HelmRelease> {
        self.objects.read().unwrap().get(key).cloned()
    }

    /// Request deletion; objects without finalizers go away immediately
    pub fn mark_for_deletion(&self, key: &ResourceKey) {
        let mut objects = self.objects.write().unwrap();
        let Some(release) = objects.get_mut(key) else {
            return;
        };
        release.metadata.deletion_timestamp = Some(Time(chrono::Utc::now()));
        if release.finalizer_set().is_empty() {
            objects.remove(key);
        }
    }

    /// Make the next `get` fail with an API error
    pub fn fail_next_get(&self, message: impl Into<String>) {
        *self.fail_next_get.write().unwrap() = Some(message.into());
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> StoreOperationCounts {
        self.operations.read().unwrap().clone()
    }

    /// Reset operation counts
    pub fn reset_counts(&self) {
        let mut ops = self.operations.write().unwrap();
        *ops = StoreOperationCounts::default();
    }
}

#[async_trait]
impl ResourceStore for MockResourceStore {
    async fn get(&self, key: &ResourceKey) -> StoreResult<HelmRelease> {
        self.operations.write().unwrap().gets += 1;

        if let Some(message) = self.fail_next_get.write().unwrap().take() {
            return Err(StoreError::Api(kube::Error::Service(message.into())));
        }

        self.objects
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    async fn update(&self, release: &HelmRelease) -> StoreResult<HelmRelease> {
        self.operations.write().unwrap().updates += 1;

        let key = release.key();
        let mut objects = self.objects.write().unwrap();
        let stored = objects
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;

        let status = stored.status.clone();
        let deletion_timestamp = stored.metadata.deletion_timestamp.clone();
        *stored = release.clone();
        stored.status = status;
        stored.metadata.deletion_timestamp = deletion_timestamp;

        let updated = stored.clone();
        if updated.is_deleting() && updated.finalizer_set().is_empty() {
            objects.remove(&key);
        }
        Ok(updated)
    }

    async fn update_status(&self, release: &HelmRelease) -> StoreResult<HelmRelease> {
        self.operations.write().unwrap().status_updates += 1;

        let key = release.key();
        let mut objects = self.objects.write().unwrap();
        let stored = objects
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })?;

        stored.status = release.status.clone();
        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::{ChartSpec, HelmReleaseSpec, ReleaseCondition, ReleaseStatusCode};

    fn release(name: &str) -> HelmRelease {
        let mut rls = HelmRelease::new(
            name,
            HelmReleaseSpec {
                release_name: name.to_string(),
                chart: ChartSpec {
                    repository: "s3://charts".to_string(),
                    name: "web".to_string(),
                    version: "1.0.0".to_string(),
                },
                values: serde_json::Value::Null,
            },
        );
        rls.metadata.namespace = Some("apps".to_string());
        rls
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let store = MockResourceStore::new();
        let err = store
            .get(&ResourceKey::new("apps", "web"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.operation_counts().gets, 1);
    }

    #[tokio::test]
    async fn test_update_keeps_status_and_status_update_keeps_spec() {
        let store = MockResourceStore::with_releases(vec![release("web")]);
        let key = ResourceKey::new("apps", "web");

        let mut rls = store.get(&key).await.unwrap();
        rls.set_condition(ReleaseCondition::new(
            ReleaseStatusCode::PendingInstall,
            None,
            "Installing release",
        ));
        rls.add_finalizer();
        store.update(&rls).await.unwrap();

        let stored = store.stored(&key).unwrap();
        assert!(stored.has_finalizer());
        assert!(stored.condition().is_none());

        rls.spec.chart.version = "2.0.0".to_string();
        store.update_status(&rls).await.unwrap();

        let stored = store.stored(&key).unwrap();
        assert_eq!(
            stored.condition_type(),
            Some(ReleaseStatusCode::PendingInstall)
        );
        assert_eq!(stored.spec.chart.version, "1.0.0");
    }

    #[tokio::test]
    async fn test_deleted_object_goes_away_with_last_finalizer() {
        let mut rls = release("web");
        rls.add_finalizer();
        let store = MockResourceStore::with_releases(vec![rls]);
        let key = ResourceKey::new("apps", "web");

        store.mark_for_deletion(&key);
        let mut rls = store.get(&key).await.unwrap();
        assert!(rls.is_deleting());

        rls.remove_finalizer();
        store.update(&rls).await.unwrap();
        assert!(store.stored(&key).is_none());
    }

    #[tokio::test]
    async fn test_injected_get_failure() {
        let store = MockResourceStore::with_releases(vec![release("web")]);
        let key = ResourceKey::new("apps", "web");

        store.fail_next_get("connection reset");
        let err = store.get(&key).await.unwrap_err();
        assert!(!err.is_not_found());

        assert!(store.get(&key).await.is_ok());
    }
}
