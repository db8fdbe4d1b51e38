//! Chart references
//!
//! A reference is the chart URL (repository joined with the chart name)
//! plus a version. Every downloader resolves it to the same archive name,
//! `<url path>-<version>.tgz`, relative to its own root.

use deckhand_core::ChartSpec;
use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{RepoError, Result};

/// A resolvable chart location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartReference {
    url: Url,
    path: String,
    name: String,
    version: String,
}

impl ChartReference {
    /// Parse a chart URL such as `s3://bucket/stable/nginx`
    pub fn parse(chart_url: &str, version: impl Into<String>) -> Result<Self> {
        let url = Url::parse(chart_url).map_err(|e| RepoError::InvalidRepositoryUrl {
            url: chart_url.to_string(),
            reason: e.to_string(),
        })?;

        // object keys and file paths use the decoded form
        let path = percent_decode_str(url.path().trim_start_matches('/'))
            .decode_utf8()
            .map_err(|e| RepoError::InvalidRepositoryUrl {
                url: chart_url.to_string(),
                reason: format!("path is not valid UTF-8: {}", e),
            })?
            .into_owned();

        let name = path
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| RepoError::InvalidRepositoryUrl {
                url: chart_url.to_string(),
                reason: "missing chart name".to_string(),
            })?;

        let version = version.into();
        if version.is_empty() {
            return Err(RepoError::InvalidRepositoryUrl {
                url: chart_url.to_string(),
                reason: "missing chart version".to_string(),
            });
        }

        Ok(Self {
            url,
            path,
            name,
            version,
        })
    }

    /// Reference for the chart a `HelmRelease` declares
    pub fn from_spec(chart: &ChartSpec) -> Result<Self> {
        Self::parse(&chart.url(), chart.version.clone())
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// Host part of the URL (the bucket for object storage)
    pub fn host(&self) -> Option<&str> {
        self.url.host_str().filter(|h| !h.is_empty())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Decoded archive path relative to the URL host, without a leading `/`
    pub fn archive_path(&self) -> String {
        format!("{}-{}.tgz", self.path, self.version)
    }
}

impl std::fmt::Display for ChartReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.url, self.version)
    }
}
