//! Annotation parsing for `HelmRelease` resources
//!
//! All keys live under the `helmreleases.deckhand.io/` prefix.

use std::collections::BTreeMap;

use kube::ResourceExt;

use crate::resource::HelmRelease;

/// Annotation keys
pub mod keys {
    /// Whether the controller acts on the resource at all
    pub const AUTODEPLOY: &str = "helmreleases.deckhand.io/autodeploy";
    /// Source code location of the deployed application
    pub const CODE: &str = "helmreleases.deckhand.io/code";
    /// Datadog dashboard for the release
    pub const DATADOG: &str = "helmreleases.deckhand.io/datadog";
    /// Owning squad
    pub const SQUAD: &str = "helmreleases.deckhand.io/squad";
    /// Slack channel of the owning squad
    pub const SLACK: &str = "helmreleases.deckhand.io/slack";
    /// Sumo Logic search for the release
    pub const SUMOLOGIC: &str = "helmreleases.deckhand.io/sumologic";
}

/// Parse a boolean the way the annotation has always been read
///
/// Accepts `1`, `t`, `T`, `true`, `TRUE`, `True` and their false
/// counterparts. Anything else is `None`.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Read the auto-deploy flag; missing or unparsable means disabled
pub fn parse_auto_deploy(annotations: &BTreeMap<String, String>) -> bool {
    annotations
        .get(keys::AUTODEPLOY)
        .map(String::as_str)
        .and_then(parse_bool)
        .unwrap_or(false)
}

/// Get a non-empty annotation value
pub fn get_annotation<'a>(annotations: &'a BTreeMap<String, String>, key: &str) -> Option<&'a str> {
    annotations
        .get(key)
        .map(|s| s.as_str())
        .filter(|s| !s.is_empty())
}

impl HelmRelease {
    /// The controller may act on this resource
    pub fn auto_deploy(&self) -> bool {
        parse_auto_deploy(self.annotations())
    }

    pub fn code(&self) -> Option<&str> {
        get_annotation(self.annotations(), keys::CODE)
    }

    pub fn datadog(&self) -> Option<&str> {
        get_annotation(self.annotations(), keys::DATADOG)
    }

    pub fn squad(&self) -> Option<&str> {
        get_annotation(self.annotations(), keys::SQUAD)
    }

    pub fn slack_channel(&self) -> Option<&str> {
        get_annotation(self.annotations(), keys::SLACK)
    }

    pub fn sumologic(&self) -> Option<&str> {
        get_annotation(self.annotations(), keys::SUMOLOGIC)
    }
}
