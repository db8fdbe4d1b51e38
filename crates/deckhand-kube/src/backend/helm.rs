//! Helm CLI backend
//!
//! Drives a `helm` v3 binary. Charts and values are handed over through
//! temporary files; releases are uninstalled with `--keep-history` so a
//! finished deletion is observable as `DELETED`.

use async_trait::async_trait;
use deckhand_core::{Chart, ReleaseStatusCode};
use serde::Deserialize;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;

use super::{
    BackendError, BackendResult, DeleteOptions, InstallOptions, ReleaseBackend, RollbackOptions,
    UpgradeOptions,
};

/// Extra time granted to the helm process beyond its own `--timeout`
const PROCESS_GRACE: Duration = Duration::from_secs(30);

/// Release backend driving the helm v3 CLI
#[derive(Debug, Clone)]
pub struct HelmCli {
    binary: PathBuf,
    namespace: String,
    kube_context: Option<String>,
    status_timeout: Duration,
}

#[derive(Deserialize)]
struct HelmStatus {
    info: HelmInfo,
}

#[derive(Deserialize)]
struct HelmInfo {
    status: String,
}

/// Map a helm release status onto the status vocabulary
fn map_helm_status(status: &str) -> ReleaseStatusCode {
    match status {
        "deployed" => ReleaseStatusCode::Deployed,
        "failed" => ReleaseStatusCode::Failed,
        "pending-install" => ReleaseStatusCode::PendingInstall,
        "pending-upgrade" => ReleaseStatusCode::PendingUpgrade,
        "pending-rollback" => ReleaseStatusCode::PendingRollback,
        "uninstalling" => ReleaseStatusCode::Deleting,
        "uninstalled" => ReleaseStatusCode::Deleted,
        "superseded" => ReleaseStatusCode::Superseded,
        _ => ReleaseStatusCode::Unknown,
    }
}

/// Parse the output of `helm status -o json`
pub fn parse_helm_status(output: &str) -> BackendResult<ReleaseStatusCode> {
    let status: HelmStatus = serde_json::from_str(output)
        .map_err(|e| BackendError::InvalidResponse(format!("helm status: {}", e)))?;
    Ok(map_helm_status(&status.info.status))
}

/// helm reports a missing release as `release: not found` on stderr
fn is_release_not_found(stderr: &str) -> bool {
    stderr.contains("release: not found")
}

fn timeout_arg(timeout: Duration) -> String {
    format!("{}s", timeout.as_secs())
}

impl HelmCli {
    /// Create a backend managing releases in a namespace
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            binary: PathBuf::from("helm"),
            namespace: namespace.into(),
            kube_context: None,
            status_timeout: super::DEFAULT_BACKEND_TIMEOUT,
        }
    }

    /// Use a specific helm binary
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Use a specific kubeconfig context
    pub fn with_kube_context(mut self, context: impl Into<String>) -> Self {
        self.kube_context = Some(context.into());
        self
    }

    /// Deadline for `helm status` calls
    pub fn with_status_timeout(mut self, timeout: Duration) -> Self {
        self.status_timeout = timeout;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn status_timeout(&self) -> Duration {
        self.status_timeout
    }

    fn global_args(&self, namespace: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--namespace".into(), namespace.into()];
        if let Some(context) = &self.kube_context {
            args.push("--kube-context".into());
            args.push(context.into());
        }
        args
    }

    fn status_args(&self, name: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["status".into(), name.into()];
        args.extend(self.global_args(&self.namespace));
        args.push("--output".into());
        args.push("json".into());
        args
    }

    fn install_args(
        &self,
        options: &InstallOptions,
        chart_path: &Path,
        values_path: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "install".into(),
            options.name.as_str().into(),
            chart_path.into(),
        ];
        args.extend(self.global_args(&options.namespace));
        args.push("--values".into());
        args.push(values_path.into());
        args.push("--timeout".into());
        args.push(timeout_arg(options.timeout).into());
        if options.reuse_name {
            args.push("--replace".into());
        }
        args
    }

    fn upgrade_args(
        &self,
        name: &str,
        options: &UpgradeOptions,
        chart_path: &Path,
        values_path: &Path,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["upgrade".into(), name.into(), chart_path.into()];
        args.extend(self.global_args(&self.namespace));
        args.push("--values".into());
        args.push(values_path.into());
        args.push("--timeout".into());
        args.push(timeout_arg(options.timeout).into());
        args
    }

    fn rollback_args(&self, name: &str, options: &RollbackOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["rollback".into(), name.into()];
        if let Some(revision) = options.revision {
            args.push(revision.to_string().into());
        }
        args.extend(self.global_args(&self.namespace));
        args.push("--timeout".into());
        args.push(timeout_arg(options.timeout).into());
        args
    }

    fn delete_args(&self, name: &str, options: &DeleteOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["uninstall".into(), name.into()];
        args.extend(self.global_args(&self.namespace));
        if !options.purge {
            args.push("--keep-history".into());
        }
        args.push("--timeout".into());
        args.push(timeout_arg(options.timeout).into());
        args
    }

    /// Run helm, returning stdout on success
    async fn run(
        &self,
        operation: &str,
        name: &str,
        args: Vec<OsString>,
        timeout: Duration,
    ) -> BackendResult<String> {
        tracing::debug!(operation, release = name, binary = %self.binary.display(), "running helm");

        let mut command = Command::new(&self.binary);
        command.args(&args).kill_on_drop(true);

        let output = tokio::time::timeout(timeout + PROCESS_GRACE, command.output())
            .await
            .map_err(|_| BackendError::Timeout(timeout + PROCESS_GRACE))??;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if is_release_not_found(&stderr) {
            return Err(BackendError::NotFound {
                name: name.to_string(),
            });
        }

        Err(BackendError::Operation {
            operation: format!("helm {}", operation),
            message: stderr.trim().to_string(),
        })
    }
}

/// Temporary copies of a chart and its values for one helm invocation
struct StagedChart {
    chart: NamedTempFile,
    values: NamedTempFile,
}

impl StagedChart {
    fn new(chart: &Chart, values: &serde_json::Value) -> BackendResult<Self> {
        let mut chart_file = tempfile::Builder::new()
            .prefix("deckhand-chart-")
            .suffix(".tgz")
            .tempfile()?;
        chart_file.write_all(chart.archive())?;
        chart_file.flush()?;

        // JSON is valid YAML
        let mut values_file = tempfile::Builder::new()
            .prefix("deckhand-values-")
            .suffix(".json")
            .tempfile()?;
        serde_json::to_writer(&mut values_file, values)
            .map_err(|e| BackendError::InvalidResponse(format!("values: {}", e)))?;
        values_file.flush()?;

        Ok(Self {
            chart: chart_file,
            values: values_file,
        })
    }
}

#[async_trait]
impl ReleaseBackend for HelmCli {
    async fn status(&self, name: &str) -> BackendResult<ReleaseStatusCode> {
        let stdout = self
            .run("status", name, self.status_args(name), self.status_timeout)
            .await?;
        parse_helm_status(&stdout)
    }

    async fn install(&self, chart: &Chart, options: &InstallOptions) -> BackendResult<()> {
        let staged = StagedChart::new(chart, &options.values)?;
        let args = self.install_args(options, staged.chart.path(), staged.values.path());
        self.run("install", &options.name, args, options.timeout)
            .await?;
        Ok(())
    }

    async fn upgrade(
        &self,
        name: &str,
        chart: &Chart,
        options: &UpgradeOptions,
    ) -> BackendResult<()> {
        let staged = StagedChart::new(chart, &options.values)?;
        let args = self.upgrade_args(name, options, staged.chart.path(), staged.values.path());
        self.run("upgrade", name, args, options.timeout).await?;
        Ok(())
    }

    async fn rollback(&self, name: &str, options: &RollbackOptions) -> BackendResult<()> {
        self.run("rollback", name, self.rollback_args(name, options), options.timeout)
            .await?;
        Ok(())
    }

    async fn delete(&self, name: &str, options: &DeleteOptions) -> BackendResult<()> {
        self.run("uninstall", name, self.delete_args(name, options), options.timeout)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_to_strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_parse_helm_status() {
        let output = r#"{"name":"web","info":{"status":"pending-upgrade","description":"Preparing upgrade"},"version":3,"namespace":"apps"}"#;
        assert_eq!(
            parse_helm_status(output).unwrap(),
            ReleaseStatusCode::PendingUpgrade
        );
        assert!(matches!(
            parse_helm_status("not json"),
            Err(BackendError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_status_timeout_is_configurable() {
        let helm = HelmCli::new("apps");
        assert_eq!(helm.status_timeout(), crate::backend::DEFAULT_BACKEND_TIMEOUT);

        let helm = helm.with_status_timeout(Duration::from_secs(45));
        assert_eq!(helm.status_timeout(), Duration::from_secs(45));
    }

    #[test]
    fn test_map_helm_status() {
        assert_eq!(map_helm_status("deployed"), ReleaseStatusCode::Deployed);
        assert_eq!(map_helm_status("failed"), ReleaseStatusCode::Failed);
        assert_eq!(map_helm_status("uninstalling"), ReleaseStatusCode::Deleting);
        assert_eq!(map_helm_status("uninstalled"), ReleaseStatusCode::Deleted);
        assert_eq!(
            map_helm_status("pending-rollback"),
            ReleaseStatusCode::PendingRollback
        );
        assert_eq!(map_helm_status("superseded"), ReleaseStatusCode::Superseded);
        assert_eq!(map_helm_status("something-new"), ReleaseStatusCode::Unknown);
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_release_not_found("Error: release: not found\n"));
        assert!(is_release_not_found(
            "Error: uninstall: Release not loaded: web: release: not found"
        ));
        assert!(!is_release_not_found("Error: Kubernetes cluster unreachable"));
    }

    #[test]
    fn test_install_args() {
        let helm = HelmCli::new("apps").with_kube_context("staging");
        let options = InstallOptions::new("web", "apps")
            .with_reuse_name()
            .with_timeout(Duration::from_secs(120));

        let args = args_to_strings(helm.install_args(
            &options,
            Path::new("/tmp/chart.tgz"),
            Path::new("/tmp/values.json"),
        ));

        assert_eq!(
            args,
            vec![
                "install",
                "web",
                "/tmp/chart.tgz",
                "--namespace",
                "apps",
                "--kube-context",
                "staging",
                "--values",
                "/tmp/values.json",
                "--timeout",
                "120s",
                "--replace",
            ]
        );
    }

    #[test]
    fn test_delete_keeps_history_unless_purging() {
        let helm = HelmCli::new("apps");

        let keep = args_to_strings(helm.delete_args("web", &DeleteOptions::default()));
        assert!(keep.contains(&"--keep-history".to_string()));

        let purge = DeleteOptions {
            purge: true,
            ..Default::default()
        };
        let purge = args_to_strings(helm.delete_args("web", &purge));
        assert!(!purge.contains(&"--keep-history".to_string()));
    }

    #[test]
    fn test_rollback_args() {
        let helm = HelmCli::new("apps");
        let args = args_to_strings(helm.rollback_args("web", &RollbackOptions::default()));
        assert_eq!(
            args,
            vec!["rollback", "web", "--namespace", "apps", "--timeout", "300s"]
        );
    }

    #[cfg(unix)]
    mod fake_binary {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        /// Write an executable shell script standing in for helm
        fn fake_helm(dir: &TempDir, script: &str) -> PathBuf {
            let path = dir.path().join("helm");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_status_through_binary() {
            let dir = TempDir::new().unwrap();
            let helm = HelmCli::new("apps").with_binary(fake_helm(
                &dir,
                r#"echo '{"name":"web","info":{"status":"deployed"}}'"#,
            ));

            assert_eq!(
                helm.status("web").await.unwrap(),
                ReleaseStatusCode::Deployed
            );
        }

        #[tokio::test]
        async fn test_missing_release_is_not_found() {
            let dir = TempDir::new().unwrap();
            let helm = HelmCli::new("apps").with_binary(fake_helm(
                &dir,
                "echo 'Error: release: not found' >&2\nexit 1",
            ));

            let err = helm.status("web").await.unwrap_err();
            assert!(err.is_not_found());
        }

        #[tokio::test]
        async fn test_other_failures_carry_stderr() {
            let dir = TempDir::new().unwrap();
            let helm = HelmCli::new("apps").with_binary(fake_helm(
                &dir,
                "echo 'Error: Kubernetes cluster unreachable' >&2\nexit 1",
            ));

            let err = helm
                .rollback("web", &RollbackOptions::default())
                .await
                .unwrap_err();
            assert!(!err.is_not_found());
            assert!(err.to_string().contains("helm rollback failed"));
            assert!(err.to_string().contains("cluster unreachable"));
        }

        #[tokio::test]
        async fn test_install_stages_chart_and_values() {
            let dir = TempDir::new().unwrap();
            let capture = dir.path().join("values-copy.json");
            // $3 is the chart archive and $7 the values file
            let helm = HelmCli::new("apps").with_binary(fake_helm(
                &dir,
                &format!(
                    "test -s \"$3\" || exit 2\ncp \"$7\" {}",
                    capture.display()
                ),
            ));

            let archive = deckhand_core::create_archive(
                "web",
                &[("Chart.yaml", "name: web\nversion: 1.0.0\n")],
            )
            .unwrap();
            let chart = Chart::from_archive(archive).unwrap();
            let options =
                InstallOptions::new("web", "apps").with_values(serde_json::json!({"replicas": 2}));

            helm.install(&chart, &options).await.unwrap();

            let values: serde_json::Value =
                serde_json::from_str(&std::fs::read_to_string(&capture).unwrap()).unwrap();
            assert_eq!(values, serde_json::json!({"replicas": 2}));
        }
    }
}
