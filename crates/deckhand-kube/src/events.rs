//! Lifecycle events attached to `HelmRelease` objects
//!
//! Events are observability only. Publishing never fails a reconcile: the
//! Kubernetes sink logs and drops errors.

use async_trait::async_trait;
use deckhand_core::HelmRelease;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Client, Resource};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// Reporting controller name on published events
pub const EVENT_REPORTER: &str = "deckhand";

/// Severity of a lifecycle event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Normal,
    Warning,
}

impl From<EventKind> for EventType {
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::Normal => EventType::Normal,
            EventKind::Warning => EventType::Warning,
        }
    }
}

/// Fire-and-forget sink for lifecycle events
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, release: &HelmRelease, kind: EventKind, reason: &str, message: &str);
}

/// Publishes Kubernetes events through the runtime recorder
#[derive(Clone)]
pub struct KubeEventSink {
    recorder: Recorder,
}

impl KubeEventSink {
    pub fn new(client: Client) -> Self {
        Self::with_reporter(client, Reporter::from(EVENT_REPORTER.to_string()))
    }

    pub fn with_reporter(client: Client, reporter: Reporter) -> Self {
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventSink for KubeEventSink {
    async fn publish(&self, release: &HelmRelease, kind: EventKind, reason: &str, message: &str) {
        let event = Event {
            type_: kind.into(),
            reason: reason.to_string(),
            note: Some(message.to_string()),
            action: "Reconcile".to_string(),
            secondary: None,
        };

        if let Err(e) = self
            .recorder
            .publish(&event, &release.object_ref(&()))
            .await
        {
            warn!(
                release = %release.key(),
                reason,
                error = %e,
                "Failed to publish event"
            );
        }
    }
}

/// Event captured by [`RecordingEventSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub object: String,
    pub kind: EventKind,
    pub reason: String,
    pub message: String,
}

/// In-memory event sink for testing
#[derive(Clone, Default)]
pub struct RecordingEventSink {
    events: Arc<RwLock<Vec<RecordedEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events published so far, oldest first
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.read().unwrap().clone()
    }

    /// Reasons of all events published so far
    pub fn reasons(&self) -> Vec<String> {
        self.events
            .read()
            .unwrap()
            .iter()
            .map(|e| e.reason.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.write().unwrap().clear();
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn publish(&self, release: &HelmRelease, kind: EventKind, reason: &str, message: &str) {
        self.events.write().unwrap().push(RecordedEvent {
            object: release.key().to_string(),
            kind,
            reason: reason.to_string(),
            message: message.to_string(),
        });
    }
}
