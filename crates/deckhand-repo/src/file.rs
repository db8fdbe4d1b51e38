//! Local file chart downloader
//!
//! `file:///srv/charts/nginx` at version `v` is read from
//! `/srv/charts/nginx-<v>.tgz`. Intended for development clusters.

use async_trait::async_trait;
use deckhand_core::Chart;
use std::path::PathBuf;

use crate::downloader::{ChartDownloader, load_chart};
use crate::error::{RepoError, Result};
use crate::reference::ChartReference;

/// Chart downloader reading archives from the local filesystem
#[derive(Debug, Clone, Default)]
pub struct FileDownloader;

impl FileDownloader {
    pub fn new() -> Self {
        Self
    }

    /// Filesystem path of the referenced archive
    pub fn archive_path(reference: &ChartReference) -> PathBuf {
        PathBuf::from("/").join(reference.archive_path())
    }
}

#[async_trait]
impl ChartDownloader for FileDownloader {
    async fn download(&self, reference: &ChartReference) -> Result<Chart> {
        let path = Self::archive_path(reference);

        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RepoError::ChartNotFound {
                    name: reference.name().to_string(),
                    version: reference.version().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        load_chart(reference, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::create_archive;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_download_from_directory() {
        let dir = TempDir::new().unwrap();
        let data = create_archive(
            "redis",
            &[("Chart.yaml", "name: redis\nversion: 0.4.0\n")],
        )
        .unwrap();
        std::fs::write(dir.path().join("redis-0.4.0.tgz"), data).unwrap();

        let url = format!("file://{}/redis", dir.path().display());
        let reference = ChartReference::parse(&url, "0.4.0").unwrap();
        let chart = FileDownloader::new().download(&reference).await.unwrap();

        assert_eq!(chart.name(), "redis");
    }

    #[tokio::test]
    async fn test_missing_archive() {
        let dir = TempDir::new().unwrap();
        let url = format!("file://{}/redis", dir.path().display());
        let reference = ChartReference::parse(&url, "0.4.0").unwrap();

        let err = FileDownloader::new().download(&reference).await.unwrap_err();
        assert!(matches!(err, RepoError::ChartNotFound { .. }));
    }
}
