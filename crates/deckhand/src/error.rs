//! Operator error types with exit code handling

use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// Errors that stop the operator process
#[derive(Error, Debug, Diagnostic)]
pub enum OperatorError {
    /// Invalid flag combination or value
    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(deckhand::config))]
    Config {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Kubernetes client could not be created
    #[error("Kubernetes client error: {0}")]
    #[diagnostic(
        code(deckhand::kube),
        help("check KUBECONFIG, --kube-context, or the in-cluster service account")
    )]
    Kube(#[from] kube::Error),

    /// Kubeconfig could not be loaded
    #[error("Kubeconfig error: {0}")]
    #[diagnostic(code(deckhand::kubeconfig))]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    /// A chart downloader could not be built
    #[error("Chart source error: {0}")]
    #[diagnostic(code(deckhand::source))]
    Source(#[from] deckhand_repo::RepoError),

    /// Notifier could not be built
    #[error("Notifier error: {0}")]
    #[diagnostic(code(deckhand::notify))]
    Notify(#[from] deckhand_kube::NotifyError),

    /// CRD could not be rendered
    #[error("Failed to render CRD: {0}")]
    #[diagnostic(code(deckhand::crd))]
    Crd(#[from] serde_yaml::Error),
}

impl OperatorError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            OperatorError::Config { .. } | OperatorError::Notify(_) => exit_codes::CONFIG_ERROR,
            OperatorError::Kube(_) | OperatorError::Kubeconfig(_) => exit_codes::KUBE_ERROR,
            OperatorError::Source(_) => exit_codes::SOURCE_ERROR,
            OperatorError::Crd(_) => exit_codes::ERROR,
        }
    }

    /// Create a configuration error with help text
    pub fn config_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            help: Some(help.into()),
        }
    }
}

/// Result type for operator startup
pub type Result<T> = std::result::Result<T, OperatorError>;
