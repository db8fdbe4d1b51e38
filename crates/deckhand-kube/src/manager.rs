//! Release lifecycle operations
//!
//! [`ReleaseManager`] issues backend mutations and mirrors each one into the
//! resource's single status condition. A failed backend call leaves the
//! resource untouched so the caller can retry from the same state.

use deckhand_core::{
    Chart, HelmRelease, ReleaseCondition, ReleaseStatusCode, StatusReason,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::backend::{
    BackendResult, DEFAULT_BACKEND_TIMEOUT, DeleteOptions, InstallOptions, ReleaseBackend,
    RollbackOptions, UpgradeOptions,
};
use crate::events::{EventKind, EventSink};

pub const MESSAGE_INSTALLING: &str = "Installing release";
pub const MESSAGE_UPGRADING: &str = "Upgrading release";
pub const MESSAGE_ROLLING_BACK: &str = "Rolling back release";
pub const MESSAGE_DELETING: &str = "Deleting release";
pub const MESSAGE_DEPLOYED: &str = "Release deployed";
pub const MESSAGE_FAILED: &str = "Release failed";

/// Drives backend operations and records them on the resource
#[derive(Clone)]
pub struct ReleaseManager {
    backend: Arc<dyn ReleaseBackend>,
    events: Arc<dyn EventSink>,
    timeout: Duration,
}

impl ReleaseManager {
    pub fn new(backend: Arc<dyn ReleaseBackend>, events: Arc<dyn EventSink>) -> Self {
        Self {
            backend,
            events,
            timeout: DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Set the timeout passed to backend mutations
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Current backend status of the release
    pub async fn status(&self, release: &HelmRelease) -> BackendResult<ReleaseStatusCode> {
        self.backend.status(release.release_name()).await
    }

    /// Install the chart under the declared release name
    pub async fn install(
        &self,
        release: &mut HelmRelease,
        chart: &Chart,
        namespace: &str,
    ) -> BackendResult<()> {
        let options = InstallOptions::new(release.release_name(), namespace)
            .with_reuse_name()
            .with_values(release.spec.values_document())
            .with_timeout(self.timeout);

        info!(
            release = %release.release_name(),
            namespace,
            chart = %chart.name(),
            version = %chart.version(),
            "Installing release"
        );
        self.backend.install(chart, &options).await?;

        self.record(release, ReleaseStatusCode::PendingInstall, None, MESSAGE_INSTALLING)
            .await;
        Ok(())
    }

    /// Upgrade the release to the chart with the declared values
    pub async fn upgrade(&self, release: &mut HelmRelease, chart: &Chart) -> BackendResult<()> {
        let options =
            UpgradeOptions::new(release.spec.values_document()).with_timeout(self.timeout);

        info!(
            release = %release.release_name(),
            chart = %chart.name(),
            version = %chart.version(),
            "Upgrading release"
        );
        self.backend
            .upgrade(release.release_name(), chart, &options)
            .await?;

        self.record(release, ReleaseStatusCode::PendingUpgrade, None, MESSAGE_UPGRADING)
            .await;
        Ok(())
    }

    /// Roll the release back to its previous revision
    pub async fn rollback(&self, release: &mut HelmRelease) -> BackendResult<()> {
        let options = RollbackOptions::default().with_timeout(self.timeout);

        info!(release = %release.release_name(), "Rolling back release");
        self.backend
            .rollback(release.release_name(), &options)
            .await?;

        self.record(
            release,
            ReleaseStatusCode::PendingRollback,
            None,
            MESSAGE_ROLLING_BACK,
        )
        .await;
        Ok(())
    }

    /// Delete the release from the backend
    pub async fn delete(&self, release: &mut HelmRelease) -> BackendResult<()> {
        let options = DeleteOptions::default().with_timeout(self.timeout);

        info!(release = %release.release_name(), "Deleting release");
        self.backend.delete(release.release_name(), &options).await?;

        self.record(release, ReleaseStatusCode::Deleting, None, MESSAGE_DELETING)
            .await;
        Ok(())
    }

    /// Record that the backend settled the release as deployed
    ///
    /// Returns the reason chosen from the prior condition.
    pub async fn deployed(&self, release: &mut HelmRelease) -> Option<StatusReason> {
        let reason = StatusReason::after_deployed(release.condition());
        self.record(release, ReleaseStatusCode::Deployed, reason, MESSAGE_DEPLOYED)
            .await;
        reason
    }

    /// Record that the backend settled the release as failed
    pub async fn failed(&self, release: &mut HelmRelease) -> Option<StatusReason> {
        let reason = StatusReason::after_failed(release.condition());
        self.record(release, ReleaseStatusCode::Failed, reason, MESSAGE_FAILED)
            .await;
        reason
    }

    async fn record(
        &self,
        release: &mut HelmRelease,
        type_: ReleaseStatusCode,
        reason: Option<StatusReason>,
        message: &str,
    ) {
        debug!(
            release = %release.release_name(),
            condition = %type_,
            reason = reason.map(|r| r.as_str()),
            "Setting release condition"
        );
        release.set_condition(ReleaseCondition::new(type_, reason, message));

        let kind = match type_ {
            ReleaseStatusCode::Failed => EventKind::Warning,
            _ => EventKind::Normal,
        };
        self.events
            .publish(release, kind, type_.as_str(), message)
            .await;
    }
}
