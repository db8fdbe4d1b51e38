//! The `HelmRelease` reconcile state machine
//!
//! Each pass fetches the resource, reads the backend status of its release
//! and takes at most one corrective action. Decisions depend only on the
//! backend status and the condition already stored on the resource, so
//! running a pass twice against unchanged state makes the same choice.
//!
//! The caller must serialize passes per key; nothing here locks.

use deckhand_core::{Chart, HelmRelease, ReleaseStatusCode, ResourceKey};
use deckhand_repo::{ChartDownloader, ChartReference};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::backend::BackendError;
use crate::error::{ReconcileError, Result};
use crate::manager::ReleaseManager;
use crate::notifications::{Notifier, deleted_message, deployed_message};
use crate::store::ResourceStore;

/// Default delay before re-checking a release after acting on it
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// When the dispatcher should run the next pass for a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Nothing to do until the resource changes
    Done,
    /// Run again immediately
    RequeueNow,
    /// Run again after the delay
    RequeueAfter(Duration),
}

/// Settings for a [`Reconciler`]
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Namespace releases are installed into
    pub namespace: String,
    /// Delay before re-checking an in-flight release
    pub grace_period: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

/// Drives one `HelmRelease` toward its declared state per pass
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn ResourceStore>,
    manager: ReleaseManager,
    downloader: Arc<dyn ChartDownloader>,
    notifier: Arc<dyn Notifier>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ResourceStore>,
        manager: ReleaseManager,
        downloader: Arc<dyn ChartDownloader>,
        notifier: Arc<dyn Notifier>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            store,
            manager,
            downloader,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Run one pass for a key
    #[instrument(skip(self, key), fields(key = %key))]
    pub async fn reconcile(&self, key: &ResourceKey) -> Result<ReconcileOutcome> {
        let mut release = match self.store.get(key).await {
            Ok(release) => release,
            Err(e) if e.is_not_found() => {
                debug!("HelmRelease no longer exists");
                return Ok(ReconcileOutcome::Done);
            }
            Err(source) => {
                return Err(ReconcileError::Fetch {
                    key: key.clone(),
                    source,
                });
            }
        };

        if !release.auto_deploy() {
            debug!("Auto-deploy disabled, skipping");
            return Ok(ReconcileOutcome::Done);
        }

        if release.is_deleting() {
            return self.reconcile_delete(&mut release).await;
        }

        if !release.has_finalizer() {
            release.add_finalizer();
            self.persist(&mut release).await?;
            info!(release = %release.release_name(), "Attached finalizer");
            return Ok(ReconcileOutcome::RequeueNow);
        }

        self.reconcile_deploy(&mut release).await
    }

    async fn reconcile_delete(&self, release: &mut HelmRelease) -> Result<ReconcileOutcome> {
        let status = match self.manager.status(release).await {
            Ok(status) => status,
            Err(e) if e.is_not_found() => {
                info!(
                    release = %release.release_name(),
                    "Release not found in backend, removing finalizer"
                );
                self.release_finalizer(release).await?;
                return Ok(ReconcileOutcome::Done);
            }
            Err(source) => return Err(self.status_error(release, source)),
        };

        match status {
            ReleaseStatusCode::Deleting => {
                debug!(release = %release.release_name(), "Deletion in progress");
                Ok(self.requeue())
            }
            ReleaseStatusCode::Deleted => {
                self.release_finalizer(release).await?;
                self.notify(release, deleted_message(release.release_name()))
                    .await;
                Ok(ReconcileOutcome::Done)
            }
            _ => {
                self.manager
                    .delete(release)
                    .await
                    .map_err(|source| self.backend_error("delete", release, source))?;
                self.persist_status(release).await?;
                Ok(self.requeue())
            }
        }
    }

    async fn reconcile_deploy(&self, release: &mut HelmRelease) -> Result<ReconcileOutcome> {
        let prior = release.condition_type();

        let status = match self.manager.status(release).await {
            Ok(status) => status,
            Err(e) if e.is_not_found() => return self.install(release).await,
            Err(source) => return Err(self.status_error(release, source)),
        };

        debug!(
            release = %release.release_name(),
            status = %status,
            prior = prior.map(|p| p.as_str()),
            "Observed backend status"
        );

        match status {
            ReleaseStatusCode::Deleted => self.install(release).await,

            ReleaseStatusCode::Deleting
            | ReleaseStatusCode::PendingInstall
            | ReleaseStatusCode::PendingUpgrade
            | ReleaseStatusCode::PendingRollback => Ok(self.requeue()),

            // upgrade on every pass; an unchanged chart and values are a
            // no-op in the backend
            ReleaseStatusCode::Deployed if prior == Some(ReleaseStatusCode::Deployed) => {
                let chart = self.download(release).await?;
                self.manager
                    .upgrade(release, &chart)
                    .await
                    .map_err(|source| self.backend_error("upgrade", release, source))?;
                self.persist_status(release).await?;
                Ok(self.requeue())
            }

            ReleaseStatusCode::Deployed => {
                let reason = self.manager.deployed(release).await;
                self.persist_status(release).await?;
                let reason = reason.map(|r| r.as_str()).unwrap_or("Unknown");
                self.notify(release, deployed_message(release.release_name(), reason))
                    .await;
                Ok(ReconcileOutcome::Done)
            }

            ReleaseStatusCode::Failed => {
                self.manager.failed(release).await;
                self.persist_status(release).await?;

                if prior != Some(ReleaseStatusCode::PendingUpgrade) {
                    warn!(
                        release = %release.release_name(),
                        prior = prior.map(|p| p.as_str()),
                        "Release failed, not rolling back"
                    );
                    return Ok(ReconcileOutcome::Done);
                }

                self.manager
                    .rollback(release)
                    .await
                    .map_err(|source| self.backend_error("rollback", release, source))?;
                self.persist_status(release).await?;
                Ok(self.requeue())
            }

            other => Err(ReconcileError::UnhandledStatus {
                release: release.release_name().to_string(),
                status: other,
            }),
        }
    }

    async fn install(&self, release: &mut HelmRelease) -> Result<ReconcileOutcome> {
        let chart = self.download(release).await?;
        self.manager
            .install(release, &chart, &self.config.namespace)
            .await
            .map_err(|source| self.backend_error("install", release, source))?;
        self.persist_status(release).await?;
        Ok(self.requeue())
    }

    async fn download(&self, release: &HelmRelease) -> Result<Chart> {
        let download_error = |source| ReconcileError::Download {
            release: release.release_name().to_string(),
            source,
        };

        let reference = ChartReference::from_spec(&release.spec.chart).map_err(download_error)?;
        debug!(release = %release.release_name(), chart = %reference, "Downloading chart");
        self.downloader
            .download(&reference)
            .await
            .map_err(download_error)
    }

    async fn release_finalizer(&self, release: &mut HelmRelease) -> Result<()> {
        if release.remove_finalizer() {
            self.persist(release).await?;
        }
        Ok(())
    }

    async fn persist(&self, release: &mut HelmRelease) -> Result<()> {
        *release = self
            .store
            .update(release)
            .await
            .map_err(|source| ReconcileError::Persist {
                operation: "update resource",
                release: release.release_name().to_string(),
                source,
            })?;
        Ok(())
    }

    async fn persist_status(&self, release: &mut HelmRelease) -> Result<()> {
        *release = self
            .store
            .update_status(release)
            .await
            .map_err(|source| ReconcileError::Persist {
                operation: "update status",
                release: release.release_name().to_string(),
                source,
            })?;
        Ok(())
    }

    async fn notify(&self, release: &HelmRelease, message: String) {
        if let Err(e) = self.notifier.send(&message).await {
            warn!(
                release = %release.release_name(),
                error = %e,
                "Failed to send notification"
            );
        }
    }

    fn requeue(&self) -> ReconcileOutcome {
        ReconcileOutcome::RequeueAfter(self.config.grace_period)
    }

    fn status_error(&self, release: &HelmRelease, source: BackendError) -> ReconcileError {
        ReconcileError::Status {
            release: release.release_name().to_string(),
            source,
        }
    }

    fn backend_error(
        &self,
        operation: &'static str,
        release: &HelmRelease,
        source: BackendError,
    ) -> ReconcileError {
        ReconcileError::Backend {
            operation,
            release: release.release_name().to_string(),
            source,
        }
    }
}
