//! Chart downloader trait and scheme registry
//!
//! Provides a single interface for all chart sources (S3, HTTP, File).
//! The registry is built once at startup and dispatches on the URL scheme.

use async_trait::async_trait;
use deckhand_core::Chart;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{RepoError, Result};
use crate::reference::ChartReference;

/// Default deadline for a single chart download
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Resolves a chart reference to a loaded chart
#[async_trait]
pub trait ChartDownloader: Send + Sync {
    /// Download and decode the referenced chart
    async fn download(&self, reference: &ChartReference) -> Result<Chart>;
}

/// Decode downloaded bytes, attributing failures to the reference
pub(crate) fn load_chart(reference: &ChartReference, data: Vec<u8>) -> Result<Chart> {
    Chart::from_archive(data).map_err(|source| RepoError::InvalidChart {
        name: reference.name().to_string(),
        version: reference.version().to_string(),
        source,
    })
}

/// Scheme to downloader lookup table
pub struct DownloaderRegistry {
    downloaders: BTreeMap<String, Box<dyn ChartDownloader>>,
    timeout: Duration,
}

impl DownloaderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            downloaders: BTreeMap::new(),
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    /// Set the download deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Register a downloader for a URL scheme, replacing any previous one
    pub fn register(
        mut self,
        scheme: impl Into<String>,
        downloader: impl ChartDownloader + 'static,
    ) -> Self {
        self.downloaders
            .insert(scheme.into().to_ascii_lowercase(), Box::new(downloader));
        self
    }

    /// Registered schemes, sorted
    pub fn schemes(&self) -> Vec<&str> {
        self.downloaders.keys().map(String::as_str).collect()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for DownloaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChartDownloader for DownloaderRegistry {
    async fn download(&self, reference: &ChartReference) -> Result<Chart> {
        let downloader =
            self.downloaders
                .get(reference.scheme())
                .ok_or_else(|| RepoError::UnsupportedScheme {
                    scheme: reference.scheme().to_string(),
                    url: reference.url().to_string(),
                })?;

        tracing::debug!(chart = %reference, "downloading chart");

        match tokio::time::timeout(self.timeout, downloader.download(reference)).await {
            Ok(result) => result,
            Err(_) => Err(RepoError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}
