//! Mock release backend for testing
//!
//! Releases live in memory. Mutations leave a release in the matching
//! pending state; tests settle it with [`MockReleaseBackend::set_status`]
//! the way a real backend eventually would.

use async_trait::async_trait;
use deckhand_core::{Chart, ReleaseStatusCode};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{
    BackendError, BackendResult, DeleteOptions, InstallOptions, ReleaseBackend, RollbackOptions,
    UpgradeOptions,
};

/// In-memory release backend for testing
#[derive(Clone, Default)]
pub struct MockReleaseBackend {
    /// Release name -> status
    releases: Arc<RwLock<HashMap<String, ReleaseStatusCode>>>,
    /// Operations that should fail, with the failure message
    failures: Arc<RwLock<HashMap<&'static str, String>>>,
    /// Track operation counts for assertions
    operations: Arc<RwLock<BackendOperationCounts>>,
    /// Most recent install options
    last_install: Arc<RwLock<Option<InstallOptions>>>,
    /// Most recent upgrade: release name, chart version, options
    last_upgrade: Arc<RwLock<Option<(String, String, UpgradeOptions)>>>,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BackendOperationCounts {
    pub statuses: usize,
    pub installs: usize,
    pub upgrades: usize,
    pub rollbacks: usize,
    pub deletes: usize,
}

impl BackendOperationCounts {
    /// Total number of calls of any kind
    pub fn total(&self) -> usize {
        self.statuses + self.installs + self.upgrades + self.rollbacks + self.deletes
    }

    /// Number of calls that change a release
    pub fn mutations(&self) -> usize {
        self.installs + self.upgrades + self.rollbacks + self.deletes
    }
}

impl MockReleaseBackend {
    /// Create a backend with no releases
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a pre-existing release
    pub fn with_release(self, name: &str, status: ReleaseStatusCode) -> Self {
        self.set_status(name, status);
        self
    }

    /// Move a release to a status, creating it if needed
    pub fn set_status(&self, name: &str, status: ReleaseStatusCode) {
        self.releases
            .write()
            .unwrap()
            .insert(name.to_string(), status);
    }

    /// Forget a release entirely, as if purged out of band
    pub fn purge(&self, name: &str) {
        self.releases.write().unwrap().remove(name);
    }

    /// Current status of a release, without counting an operation
    pub fn release_status(&self, name: &str) -> Option<ReleaseStatusCode> {
        self.releases.read().unwrap().get(name).copied()
    }

    /// Make an operation (`status`, `install`, `upgrade`, `rollback`, `delete`) fail
    pub fn fail_on(&self, operation: &'static str, message: impl Into<String>) {
        self.failures
            .write()
            .unwrap()
            .insert(operation, message.into());
    }

    /// Stop failing an operation
    pub fn clear_failure(&self, operation: &'static str) {
        self.failures.write().unwrap().remove(operation);
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> BackendOperationCounts {
        self.operations.read().unwrap().clone()
    }

    /// Reset operation counts
    pub fn reset_counts(&self) {
        let mut ops = self.operations.write().unwrap();
        *ops = BackendOperationCounts::default();
    }

    /// Options passed to the most recent install
    pub fn last_install(&self) -> Option<InstallOptions> {
        self.last_install.read().unwrap().clone()
    }

    /// Release name, chart version and options of the most recent upgrade
    pub fn last_upgrade(&self) -> Option<(String, String, UpgradeOptions)> {
        self.last_upgrade.read().unwrap().clone()
    }

    fn check_failure(&self, operation: &'static str) -> BackendResult<()> {
        match self.failures.read().unwrap().get(operation) {
            Some(message) => Err(BackendError::Operation {
                operation: operation.to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn require(&self, name: &str) -> BackendResult<()> {
        if self.releases.read().unwrap().contains_key(name) {
            Ok(())
        } else {
            Err(BackendError::NotFound {
                name: name.to_string(),
            })
        }
    }
}

#[async_trait]
impl ReleaseBackend for MockReleaseBackend {
    async fn status(&self, name: &str) -> BackendResult<ReleaseStatusCode> {
        self.operations.write().unwrap().statuses += 1;
        self.check_failure("status")?;

        self.release_status(name).ok_or_else(|| BackendError::NotFound {
            name: name.to_string(),
        })
    }

    async fn install(&self, _chart: &Chart, options: &InstallOptions) -> BackendResult<()> {
        self.operations.write().unwrap().installs += 1;
        self.check_failure("install")?;

        let existing = self.release_status(&options.name);
        match existing {
            None => {}
            Some(ReleaseStatusCode::Deleted) if options.reuse_name => {}
            Some(_) => {
                return Err(BackendError::Operation {
                    operation: "install".to_string(),
                    message: format!("cannot re-use a name that is still in use: {}", options.name),
                });
            }
        }

        *self.last_install.write().unwrap() = Some(options.clone());
        self.set_status(&options.name, ReleaseStatusCode::PendingInstall);
        Ok(())
    }

    async fn upgrade(
        &self,
        name: &str,
        chart: &Chart,
        options: &UpgradeOptions,
    ) -> BackendResult<()> {
        self.operations.write().unwrap().upgrades += 1;
        self.check_failure("upgrade")?;
        self.require(name)?;

        *self.last_upgrade.write().unwrap() = Some((
            name.to_string(),
            chart.version().to_string(),
            options.clone(),
        ));
        self.set_status(name, ReleaseStatusCode::PendingUpgrade);
        Ok(())
    }

    async fn rollback(&self, name: &str, _options: &RollbackOptions) -> BackendResult<()> {
        self.operations.write().unwrap().rollbacks += 1;
        self.check_failure("rollback")?;
        self.require(name)?;

        self.set_status(name, ReleaseStatusCode::PendingRollback);
        Ok(())
    }

    async fn delete(&self, name: &str, options: &DeleteOptions) -> BackendResult<()> {
        self.operations.write().unwrap().deletes += 1;
        self.check_failure("delete")?;
        self.require(name)?;

        if options.purge {
            self.purge(name);
        } else {
            self.set_status(name, ReleaseStatusCode::Deleting);
        }
        Ok(())
    }
}
