//! Binding of the [`Reconciler`] to the kube runtime controller
//!
//! The runtime owns watching, the work queue and per-key serialization.
//! This module filters watch events and translates outcomes and errors into
//! requeue actions.

use deckhand_core::annotations::keys;
use deckhand_core::{HelmRelease, ResourceKey};
use futures::StreamExt;
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::{WatchStreamExt, reflector, watcher};
use kube::{Api, Client, ResourceExt};
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ReconcileError;
use crate::reconciler::{ReconcileOutcome, Reconciler};

/// First retry delay after a failed pass
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound for retry delays
pub const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Default number of keys reconciled concurrently
pub const DEFAULT_WORKERS: u16 = 4;

/// Settings for the controller loop
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Watch a single namespace; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Maximum concurrent reconciles across keys
    pub workers: u16,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            workers: DEFAULT_WORKERS,
        }
    }
}

/// Per-key exponential backoff
#[derive(Debug, Default)]
pub struct Backoff {
    failures: Mutex<HashMap<ResourceKey, u32>>,
}

impl Backoff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure and return the delay before the next attempt
    pub fn next_delay(&self, key: &ResourceKey) -> Duration {
        let mut failures = self.failures.lock().unwrap_or_else(|e| e.into_inner());
        let attempts = failures.entry(key.clone()).or_insert(0);
        let delay = INITIAL_BACKOFF
            .checked_mul(2u32.saturating_pow(*attempts))
            .map_or(MAX_BACKOFF, |d| d.min(MAX_BACKOFF));
        *attempts = attempts.saturating_add(1);
        delay
    }

    /// Forget failures after a successful pass
    pub fn reset(&self, key: &ResourceKey) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    /// Consecutive failures recorded for a key
    pub fn failures(&self, key: &ResourceKey) -> u32 {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

/// Hash of the fields whose change starts a pass
///
/// Status writes and finalizer edits leave it unchanged, so the controller's
/// own writes do not retrigger it. Generation covers spec changes; the
/// deletion timestamp and the auto-deploy annotation do not bump it.
pub fn reconcile_trigger(release: &HelmRelease) -> Option<u64> {
    let mut hasher = DefaultHasher::new();
    release.metadata.generation.hash(&mut hasher);
    release.metadata.deletion_timestamp.is_some().hash(&mut hasher);
    release.annotations().get(keys::AUTODEPLOY).hash(&mut hasher);
    Some(hasher.finish())
}

/// State shared by every reconcile task
pub struct Context {
    pub reconciler: Reconciler,
    pub backoff: Backoff,
}

impl Context {
    pub fn new(reconciler: Reconciler) -> Self {
        Self {
            reconciler,
            backoff: Backoff::new(),
        }
    }
}

impl From<ReconcileOutcome> for Action {
    fn from(outcome: ReconcileOutcome) -> Self {
        match outcome {
            ReconcileOutcome::Done => Action::await_change(),
            ReconcileOutcome::RequeueNow => Action::requeue(Duration::ZERO),
            ReconcileOutcome::RequeueAfter(delay) => Action::requeue(delay),
        }
    }
}

async fn reconcile(
    release: Arc<HelmRelease>,
    ctx: Arc<Context>,
) -> Result<Action, ReconcileError> {
    let key = release.key();
    let outcome = ctx.reconciler.reconcile(&key).await?;
    ctx.backoff.reset(&key);
    debug!(%key, ?outcome, "Reconciled");
    Ok(outcome.into())
}

fn error_policy(release: Arc<HelmRelease>, error: &ReconcileError, ctx: Arc<Context>) -> Action {
    let key = release.key();
    let delay = ctx.backoff.next_delay(&key);
    warn!(
        %key,
        operation = error.operation(),
        error = %error,
        retry_in = ?delay,
        "Reconcile failed"
    );
    Action::requeue(delay)
}

/// Watch `HelmRelease` objects and reconcile them until a shutdown signal
pub async fn run(client: Client, reconciler: Reconciler, config: RuntimeConfig) {
    let api: Api<HelmRelease> = match &config.watch_namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    };

    info!(
        namespace = config.watch_namespace.as_deref().unwrap_or("*"),
        workers = config.workers,
        "Starting HelmRelease controller"
    );

    let (reader, writer) = reflector::store();
    let releases = reflector(writer, watcher(api, watcher::Config::default()))
        .applied_objects()
        .default_backoff()
        .predicate_filter(reconcile_trigger);

    Controller::for_stream(releases, reader)
        .with_config(controller::Config::default().concurrency(config.workers))
        .shutdown_on_signal()
        .run(reconcile, error_policy, Arc::new(Context::new(reconciler)))
        .for_each(|result| async move {
            if let Err(e) = result {
                debug!(error = %e, "Controller event");
            }
        })
        .await;

    info!("Controller stopped");
}
