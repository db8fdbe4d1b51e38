//! Outbound release notifications
//!
//! Delivery is best-effort. Callers log a failed send and move on; a chat
//! outage never changes a reconcile outcome.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Default Slack Web API base URL
pub const SLACK_API_URL: &str = "https://slack.com/api";

/// Errors returned by a notifier
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("notification rejected with HTTP {status}")]
    Http { status: u16 },

    #[error("notification rejected: {0}")]
    Rejected(String),
}

/// Best-effort delivery of a human-readable message
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<(), NotifyError>;
}

/// Message sent when a release reaches `DEPLOYED`
pub fn deployed_message(release_name: &str, reason: &str) -> String {
    format!("Release `{release_name}` deployed ({reason})")
}

/// Message sent when a release is gone from the backend
pub fn deleted_message(release_name: &str) -> String {
    format!("Release `{release_name}` deleted")
}

/// Posts messages to a Slack channel through `chat.postMessage`
#[derive(Clone)]
pub struct SlackNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
    channel: String,
}

#[derive(Deserialize)]
struct SlackResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

impl SlackNotifier {
    pub fn new(token: impl Into<String>, channel: impl Into<String>) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: SLACK_API_URL.to_string(),
            token: token.into(),
            channel: channel.into(),
        })
    }

    /// Override the API base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(format!("{}/chat.postMessage", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({
                "channel": self.channel,
                "text": message,
                "as_user": true,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Http {
                status: status.as_u16(),
            });
        }

        let body: SlackResponse = response.json().await?;
        if body.ok {
            Ok(())
        } else {
            Err(NotifyError::Rejected(
                body.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }
}

/// Notifier used when no channel is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _message: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// In-memory notifier for testing
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<RwLock<Vec<String>>>,
    failure: Arc<RwLock<Option<String>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every send with this error, still recording the message
    pub fn failing(message: impl Into<String>) -> Self {
        let notifier = Self::default();
        *notifier.failure.write().unwrap() = Some(message.into());
        notifier
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.read().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &str) -> Result<(), NotifyError> {
        self.messages.write().unwrap().push(message.to_string());
        match self.failure.read().unwrap().as_ref() {
            Some(error) => Err(NotifyError::Rejected(error.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_messages() {
        assert_eq!(
            deployed_message("web", "InstallSuccess"),
            "Release `web` deployed (InstallSuccess)"
        );
        assert_eq!(deleted_message("web"), "Release `web` deleted");
    }

    #[tokio::test]
    async fn test_slack_posts_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .and(header("authorization", "Bearer xoxb-test"))
            .and(body_partial_json(serde_json::json!({
                "channel": "#deploys",
                "text": "Release `web` deleted",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new("xoxb-test", "#deploys")
            .unwrap()
            .with_base_url(server.uri());
        notifier.send("Release `web` deleted").await.unwrap();
    }

    #[tokio::test]
    async fn test_slack_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat.postMessage"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"ok": false, "error": "channel_not_found"})),
            )
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new("xoxb-test", "#missing")
            .unwrap()
            .with_base_url(server.uri());
        let err = notifier.send("hello").await.unwrap_err();
        assert!(matches!(err, NotifyError::Rejected(ref e) if e == "channel_not_found"));
    }

    #[tokio::test]
    async fn test_slack_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let notifier = SlackNotifier::new("xoxb-test", "#deploys")
            .unwrap()
            .with_base_url(format!("{}/", server.uri()));
        let err = notifier.send("hello").await.unwrap_err();
        assert!(matches!(err, NotifyError::Http { status: 503 }));
    }

    #[tokio::test]
    async fn test_recording_notifier() {
        let notifier = RecordingNotifier::failing("offline");
        assert!(notifier.send("one").await.is_err());
        assert_eq!(notifier.messages(), vec!["one"]);
        assert!(NoopNotifier.send("two").await.is_ok());
    }
}
