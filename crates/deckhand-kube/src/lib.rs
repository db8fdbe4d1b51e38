//! Deckhand Kube - `HelmRelease` reconciliation
//!
//! This crate provides:
//! - **Reconciler**: The level-triggered state machine driving a release toward its declared state
//! - **Release Manager**: Backend mutations mirrored into the resource's status condition
//! - **Release Backends**: The Helm CLI, plus an in-memory mock
//! - **Resource Stores**: `HelmRelease` persistence through the API server, plus an in-memory mock
//! - **Events and Notifications**: Kubernetes events and best-effort Slack messages
//! - **Runtime**: Binding to the kube controller with per-key exponential backoff

pub mod backend;
pub mod error;
pub mod events;
pub mod manager;
pub mod notifications;
pub mod reconciler;
pub mod runtime;
pub mod store;

pub use backend::{
    BackendError, BackendResult, DeleteOptions, HelmCli, InstallOptions, MockReleaseBackend,
    ReleaseBackend, RollbackOptions, UpgradeOptions,
};
pub use error::{ReconcileError, Result};
pub use events::{EventKind, EventSink, KubeEventSink, RecordingEventSink};
pub use manager::ReleaseManager;
pub use notifications::{NoopNotifier, Notifier, NotifyError, RecordingNotifier, SlackNotifier};
pub use reconciler::{ReconcileOutcome, Reconciler, ReconcilerConfig};
pub use runtime::{Backoff, RuntimeConfig, reconcile_trigger};
pub use store::{KubeResourceStore, MockResourceStore, ResourceStore, StoreError};
