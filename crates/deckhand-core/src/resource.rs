//! The `HelmRelease` custom resource
//!
//! A `HelmRelease` declares that a named release should run a given chart
//! version with a given values document. Its status carries a single
//! current condition that mirrors the backend release.

use chrono::{DateTime, SecondsFormat, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::{JsonSchema, Schema, SchemaGenerator, json_schema};
use serde::{Deserialize, Serialize};

use crate::release::{ReleaseStatusCode, StatusReason};

/// API group of the custom resource
pub const API_GROUP: &str = "deckhand.io";

/// Desired state of a release
#[derive(CustomResource, Debug, Clone, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "HelmRelease",
    group = "deckhand.io",
    version = "v1beta1",
    namespaced,
    status = "HelmReleaseStatus",
    shortname = "rls",
    printcolumn = r#"{"name":"Release", "type":"string", "jsonPath":".spec.releaseName"}, {"name":"Chart", "type":"string", "jsonPath":".spec.chart.name"}, {"name":"Version", "type":"string", "jsonPath":".spec.chart.version"}, {"name":"Status", "type":"string", "jsonPath":".status.condition.type"}, {"name":"Reason", "type":"string", "jsonPath":".status.condition.reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseSpec {
    /// Name of the release in the backend
    pub release_name: String,

    /// Chart to deploy
    pub chart: ChartSpec,

    /// Values passed to the chart, verbatim
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub values: serde_json::Value,
}

impl HelmReleaseSpec {
    /// Values document handed to the backend; an absent document is an empty map
    pub fn values_document(&self) -> serde_json::Value {
        if self.values.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            self.values.clone()
        }
    }
}

fn preserve_unknown_fields(_gen: &mut SchemaGenerator) -> Schema {
    json_schema!({
        "type": "object",
        "x-kubernetes-preserve-unknown-fields": true
    })
}

/// Where to find a chart
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChartSpec {
    /// Repository URL, e.g. `s3://charts-bucket/stable`
    pub repository: String,

    /// Chart name within the repository
    pub name: String,

    /// Chart version
    pub version: String,
}

impl ChartSpec {
    /// Repository joined with the chart name
    pub fn url(&self) -> String {
        format!("{}/{}", self.repository.trim_end_matches('/'), self.name)
    }

    /// Archive file name, `<name>-<version>.tgz`
    pub fn archive_name(&self) -> String {
        format!("{}-{}.tgz", self.name, self.version)
    }
}

/// Observed state of a release
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseStatus {
    /// Current condition; replaced in place on every transition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<ReleaseCondition>,
}

impl HelmReleaseStatus {
    /// Overwrite the current condition, stamping its times with now
    pub fn set_condition(&mut self, condition: ReleaseCondition) {
        self.set_condition_at(condition, Utc::now());
    }

    /// Overwrite the current condition at a given instant
    ///
    /// The transition time is kept only when type and reason are unchanged.
    pub fn set_condition_at(&mut self, mut condition: ReleaseCondition, now: DateTime<Utc>) {
        let now = now.to_rfc3339_opts(SecondsFormat::Secs, true);

        let transition = match &self.condition {
            Some(current)
                if current.type_ == condition.type_ && current.reason == condition.reason =>
            {
                current
                    .last_transition_time
                    .clone()
                    .unwrap_or_else(|| now.clone())
            }
            _ => now.clone(),
        };

        condition.last_update_time = Some(now);
        condition.last_transition_time = Some(transition);
        self.condition = Some(condition);
    }
}

/// A single status condition
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseCondition {
    /// Backend status code this condition mirrors
    #[serde(rename = "type")]
    pub type_: ReleaseStatusCode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<StatusReason>,

    #[serde(default)]
    pub message: String,

    /// RFC 3339 timestamp of the last write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<String>,

    /// RFC 3339 timestamp of the last change of type or reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

impl ReleaseCondition {
    /// Create an unstamped condition
    pub fn new(
        type_: ReleaseStatusCode,
        reason: Option<StatusReason>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_,
            reason,
            message: message.into(),
            last_update_time: None,
            last_transition_time: None,
        }
    }
}

/// Namespace and name of a `HelmRelease`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl HelmRelease {
    /// Namespace and name of this resource
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.namespace().unwrap_or_default(), self.name_any())
    }

    /// Backend release name
    pub fn release_name(&self) -> &str {
        &self.spec.release_name
    }

    /// Current condition, if any
    pub fn condition(&self) -> Option<&ReleaseCondition> {
        self.status.as_ref().and_then(|s| s.condition.as_ref())
    }

    /// Type of the current condition, if any
    pub fn condition_type(&self) -> Option<ReleaseStatusCode> {
        self.condition().map(|c| c.type_)
    }

    /// Overwrite the current condition
    pub fn set_condition(&mut self, condition: ReleaseCondition) {
        self.status
            .get_or_insert_with(HelmReleaseStatus::default)
            .set_condition(condition);
    }

    /// Deletion has been requested
    pub fn is_deleting(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }
}
