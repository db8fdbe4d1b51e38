//! Release status vocabulary
//!
//! The backend is authoritative for a release's status; the resource
//! condition mirrors it with a lag of one reconcile.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::resource::ReleaseCondition;

/// Status code reported by the release backend
///
/// Note: This enum is non-exhaustive - the backend may grow new states.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ReleaseStatusCode {
    Unknown,
    PendingInstall,
    PendingUpgrade,
    PendingRollback,
    Deployed,
    Failed,
    Deleting,
    Deleted,
    Superseded,
}

impl ReleaseStatusCode {
    /// Wire name of the status code
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::PendingInstall => "PENDING_INSTALL",
            Self::PendingUpgrade => "PENDING_UPGRADE",
            Self::PendingRollback => "PENDING_ROLLBACK",
            Self::Deployed => "DEPLOYED",
            Self::Failed => "FAILED",
            Self::Deleting => "DELETING",
            Self::Deleted => "DELETED",
            Self::Superseded => "SUPERSEDED",
        }
    }

    /// An install, upgrade or rollback has been started but not settled
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Self::PendingInstall | Self::PendingUpgrade | Self::PendingRollback
        )
    }

    /// The backend is still working on this release; nothing to do but wait
    pub fn is_in_progress(&self) -> bool {
        self.is_pending() || matches!(self, Self::Deleting)
    }
}

impl std::fmt::Display for ReleaseStatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReleaseStatusCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNKNOWN" => Ok(Self::Unknown),
            "PENDING_INSTALL" => Ok(Self::PendingInstall),
            "PENDING_UPGRADE" => Ok(Self::PendingUpgrade),
            "PENDING_ROLLBACK" => Ok(Self::PendingRollback),
            "DEPLOYED" => Ok(Self::Deployed),
            "FAILED" => Ok(Self::Failed),
            "DELETING" => Ok(Self::Deleting),
            "DELETED" => Ok(Self::Deleted),
            "SUPERSEDED" => Ok(Self::Superseded),
            other => Err(format!("unknown release status code '{}'", other)),
        }
    }
}

/// Outcome tag recorded alongside a condition
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum StatusReason {
    Unknown,
    DeleteError,
    InstallError,
    InstallSuccess,
    RollbackError,
    RollbackSuccess,
    UpdateError,
    UpdateSuccess,
}

impl StatusReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::DeleteError => "DeleteError",
            Self::InstallError => "InstallError",
            Self::InstallSuccess => "InstallSuccess",
            Self::RollbackError => "RollbackError",
            Self::RollbackSuccess => "RollbackSuccess",
            Self::UpdateError => "UpdateError",
            Self::UpdateSuccess => "UpdateSuccess",
        }
    }

    /// Reason for a release that settled as deployed
    ///
    /// Derived from the condition written before the backend settled. A
    /// release that was already deployed keeps its previous reason.
    pub fn after_deployed(prior: Option<&ReleaseCondition>) -> Option<Self> {
        match prior.map(|c| c.type_) {
            Some(ReleaseStatusCode::PendingInstall) => Some(Self::InstallSuccess),
            Some(ReleaseStatusCode::PendingUpgrade) => Some(Self::UpdateSuccess),
            Some(ReleaseStatusCode::PendingRollback) => Some(Self::RollbackSuccess),
            Some(ReleaseStatusCode::Deployed) => prior.and_then(|c| c.reason),
            _ => Some(Self::Unknown),
        }
    }

    /// Reason for a release that settled as failed
    ///
    /// A release that had already failed keeps its previous reason.
    pub fn after_failed(prior: Option<&ReleaseCondition>) -> Option<Self> {
        match prior.map(|c| c.type_) {
            Some(ReleaseStatusCode::PendingInstall) => Some(Self::InstallError),
            Some(ReleaseStatusCode::PendingUpgrade) => Some(Self::UpdateError),
            Some(ReleaseStatusCode::PendingRollback) => Some(Self::RollbackError),
            Some(ReleaseStatusCode::Failed) => prior.and_then(|c| c.reason),
            _ => Some(Self::Unknown),
        }
    }
}

impl std::fmt::Display for StatusReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(type_: ReleaseStatusCode, reason: Option<StatusReason>) -> ReleaseCondition {
        ReleaseCondition::new(type_, reason, "test")
    }

    #[test]
    fn test_status_code_wire_names() {
        assert_eq!(
            serde_json::to_string(&ReleaseStatusCode::PendingUpgrade).unwrap(),
            "\"PENDING_UPGRADE\""
        );
        assert_eq!(
            "DELETING".parse::<ReleaseStatusCode>().unwrap(),
            ReleaseStatusCode::Deleting
        );
        assert!("deployed".parse::<ReleaseStatusCode>().is_err());
        assert_eq!(ReleaseStatusCode::Deleted.to_string(), "DELETED");
    }

    #[test]
    fn test_in_progress_codes() {
        assert!(ReleaseStatusCode::PendingInstall.is_in_progress());
        assert!(ReleaseStatusCode::PendingRollback.is_in_progress());
        assert!(ReleaseStatusCode::Deleting.is_in_progress());
        assert!(!ReleaseStatusCode::Deleting.is_pending());
        assert!(!ReleaseStatusCode::Deployed.is_in_progress());
        assert!(!ReleaseStatusCode::Deleted.is_in_progress());
    }

    #[test]
    fn test_deployed_reason_follows_prior_type() {
        let install = condition(ReleaseStatusCode::PendingInstall, None);
        let upgrade = condition(ReleaseStatusCode::PendingUpgrade, None);
        let rollback = condition(ReleaseStatusCode::PendingRollback, None);
        let failed = condition(ReleaseStatusCode::Failed, Some(StatusReason::InstallError));

        assert_eq!(
            StatusReason::after_deployed(Some(&install)),
            Some(StatusReason::InstallSuccess)
        );
        assert_eq!(
            StatusReason::after_deployed(Some(&upgrade)),
            Some(StatusReason::UpdateSuccess)
        );
        assert_eq!(
            StatusReason::after_deployed(Some(&rollback)),
            Some(StatusReason::RollbackSuccess)
        );
        assert_eq!(
            StatusReason::after_deployed(Some(&failed)),
            Some(StatusReason::Unknown)
        );
        assert_eq!(StatusReason::after_deployed(None), Some(StatusReason::Unknown));
    }

    #[test]
    fn test_deployed_reason_carries_forward() {
        let deployed = condition(ReleaseStatusCode::Deployed, Some(StatusReason::UpdateSuccess));
        assert_eq!(
            StatusReason::after_deployed(Some(&deployed)),
            Some(StatusReason::UpdateSuccess)
        );
    }

    #[test]
    fn test_failed_reason_follows_prior_type() {
        let install = condition(ReleaseStatusCode::PendingInstall, None);
        let upgrade = condition(ReleaseStatusCode::PendingUpgrade, None);
        let rollback = condition(ReleaseStatusCode::PendingRollback, None);
        let failed = condition(ReleaseStatusCode::Failed, Some(StatusReason::RollbackError));

        assert_eq!(
            StatusReason::after_failed(Some(&install)),
            Some(StatusReason::InstallError)
        );
        assert_eq!(
            StatusReason::after_failed(Some(&upgrade)),
            Some(StatusReason::UpdateError)
        );
        assert_eq!(
            StatusReason::after_failed(Some(&rollback)),
            Some(StatusReason::RollbackError)
        );
        assert_eq!(
            StatusReason::after_failed(Some(&failed)),
            Some(StatusReason::RollbackError)
        );
        assert_eq!(StatusReason::after_failed(None), Some(StatusReason::Unknown));
    }
}
