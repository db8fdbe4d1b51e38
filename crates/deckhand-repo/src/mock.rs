//! Mock chart downloader for testing
//!
//! Serves charts packed in memory, useful for controller tests
//! without object storage.

use async_trait::async_trait;
use deckhand_core::{Chart, create_archive};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::downloader::{ChartDownloader, load_chart};
use crate::error::{RepoError, Result};
use crate::reference::ChartReference;

/// In-memory chart downloader for testing
#[derive(Clone, Default)]
pub struct MockChartDownloader {
    /// Packed archives: (name, version) -> bytes
    charts: Arc<RwLock<HashMap<(String, String), Vec<u8>>>>,
    /// References requested so far
    requests: Arc<RwLock<Vec<ChartReference>>>,
}

impl MockChartDownloader {
    /// Create a downloader that knows no charts
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a minimal chart with the given name and version
    pub fn with_chart(self, name: &str, version: &str) -> Self {
        let chart_yaml = format!("apiVersion: v2\nname: {}\nversion: {}\n", name, version);
        let data = create_archive(
            name,
            &[
                ("Chart.yaml", chart_yaml.as_str()),
                ("templates/configmap.yaml", "kind: ConfigMap\n"),
            ],
        )
        .unwrap();
        self.with_archive(name, version, data)
    }

    /// Serve arbitrary bytes as the archive for a chart
    pub fn with_archive(self, name: &str, version: &str, data: Vec<u8>) -> Self {
        self.charts
            .write()
            .unwrap()
            .insert((name.to_string(), version.to_string()), data);
        self
    }

    /// Number of download requests received
    pub fn download_count(&self) -> usize {
        self.requests.read().unwrap().len()
    }

    /// All references requested, in order
    pub fn requests(&self) -> Vec<ChartReference> {
        self.requests.read().unwrap().clone()
    }
}

#[async_trait]
impl ChartDownloader for MockChartDownloader {
    async fn download(&self, reference: &ChartReference) -> Result<Chart> {
        self.requests.write().unwrap().push(reference.clone());

        let data = self
            .charts
            .read()
            .unwrap()
            .get(&(reference.name().to_string(), reference.version().to_string()))
            .cloned()
            .ok_or_else(|| RepoError::ChartNotFound {
                name: reference.name().to_string(),
                version: reference.version().to_string(),
            })?;

        load_chart(reference, data)
    }
}
