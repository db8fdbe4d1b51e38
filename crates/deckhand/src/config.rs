//! Operator configuration from flags and environment

use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{OperatorError, Result};

/// Settings for the `run` command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Namespace releases are installed into
    #[arg(long, env = "DECKHAND_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Only watch HelmReleases in this namespace (default: all namespaces)
    #[arg(long, env = "DECKHAND_WATCH_NAMESPACE")]
    pub watch_namespace: Option<String>,

    /// Delay before re-checking a release after acting on it
    #[arg(long, env = "DECKHAND_GRACE_PERIOD", default_value = "10s", value_parser = humantime::parse_duration)]
    pub grace_period: Duration,

    /// Maximum HelmReleases reconciled concurrently
    #[arg(long, env = "DECKHAND_WORKERS", default_value_t = 4)]
    pub workers: u16,

    /// AWS region for s3:// chart repositories (default: SDK region chain)
    #[arg(long, env = "AWS_REGION")]
    pub aws_region: Option<String>,

    /// Deadline for a single chart download
    #[arg(long, env = "DECKHAND_DOWNLOAD_TIMEOUT", default_value = "60s", value_parser = humantime::parse_duration)]
    pub download_timeout: Duration,

    /// Helm binary to run
    #[arg(long, env = "DECKHAND_HELM_BINARY", default_value = "helm")]
    pub helm_binary: PathBuf,

    /// Timeout passed to helm operations
    #[arg(long, env = "DECKHAND_HELM_TIMEOUT", default_value = "5m", value_parser = humantime::parse_duration)]
    pub helm_timeout: Duration,

    /// Kubeconfig context (default: current context or in-cluster config)
    #[arg(long, env = "DECKHAND_KUBE_CONTEXT")]
    pub kube_context: Option<String>,

    /// Slack bot token for release notifications
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    pub slack_token: Option<String>,

    /// Slack channel for release notifications
    #[arg(long, env = "SLACK_CHANNEL")]
    pub slack_channel: Option<String>,
}

/// Slack settings, present only when both token and channel are set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackSettings {
    pub token: String,
    pub channel: String,
}

impl RunArgs {
    /// Check flag combinations clap cannot express
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(OperatorError::config_with_help(
                "--workers must be at least 1",
                "use --workers 1 to reconcile one HelmRelease at a time",
            ));
        }
        if self.grace_period.is_zero() {
            return Err(OperatorError::config_with_help(
                "--grace-period must be greater than zero",
                "a zero grace period re-checks in-flight releases in a busy loop",
            ));
        }
        if self.namespace.trim().is_empty() {
            return Err(OperatorError::config_with_help(
                "--namespace must not be empty",
                "releases need a target namespace, e.g. --namespace default",
            ));
        }
        self.slack().map(|_| ())
    }

    /// Slack settings, if notifications are enabled
    pub fn slack(&self) -> Result<Option<SlackSettings>> {
        match (&self.slack_token, &self.slack_channel) {
            (Some(token), Some(channel)) => Ok(Some(SlackSettings {
                token: token.clone(),
                channel: channel.clone(),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(OperatorError::config_with_help(
                "--slack-token is set without --slack-channel",
                "set both to enable notifications, or neither to disable them",
            )),
            (None, Some(_)) => Err(OperatorError::config_with_help(
                "--slack-channel is set without --slack-token",
                "set both to enable notifications, or neither to disable them",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: RunArgs,
    }

    fn parse(args: &[&str]) -> RunArgs {
        let mut argv = vec!["deckhand"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn test_duration_flags() {
        let args = parse(&["--grace-period", "30s", "--helm-timeout", "10m"]);
        assert_eq!(args.grace_period, Duration::from_secs(30));
        assert_eq!(args.helm_timeout, Duration::from_secs(600));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let result = TestCli::try_parse_from(["deckhand", "--grace-period", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let args = parse(&["--workers", "0"]);
        let err = args.validate().unwrap_err();
        assert!(err.to_string().contains("--workers"));
    }

    #[test]
    fn test_slack_needs_token_and_channel() {
        let mut args = parse(&["--grace-period", "5s"]);
        args.slack_token = None;
        args.slack_channel = None;
        assert_eq!(args.slack().unwrap(), None);

        args.slack_token = Some("xoxb-1".to_string());
        assert!(args.slack().is_err());

        args.slack_channel = Some("#deploys".to_string());
        assert_eq!(
            args.slack().unwrap(),
            Some(SlackSettings {
                token: "xoxb-1".to_string(),
                channel: "#deploys".to_string(),
            })
        );
    }
}
