//! HTTP(S) chart downloader
//!
//! `https://charts.example.com/stable/nginx` at version `v` is fetched from
//! `https://charts.example.com/stable/nginx-<v>.tgz`.

use async_trait::async_trait;
use deckhand_core::Chart;
use std::time::Duration;

use crate::downloader::{ChartDownloader, load_chart};
use crate::error::{RepoError, Result};
use crate::reference::ChartReference;

/// Chart downloader for plain HTTP chart servers
#[derive(Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("deckhand/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }

    /// Full archive URL for a reference, keeping the path encoded
    pub fn archive_url(reference: &ChartReference) -> String {
        let url = reference.url();
        format!(
            "{}-{}.tgz",
            &url[..url::Position::AfterPath],
            reference.version()
        )
    }
}

#[async_trait]
impl ChartDownloader for HttpDownloader {
    async fn download(&self, reference: &ChartReference) -> Result<Chart> {
        let url = Self::archive_url(reference);
        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(RepoError::ChartNotFound {
                name: reference.name().to_string(),
                version: reference.version().to_string(),
            });
        }
        if !status.is_success() {
            return Err(RepoError::HttpError {
                status: status.as_u16(),
                message: format!("Request to {} failed", url),
            });
        }

        let bytes = response.bytes().await.map_err(|e| RepoError::NetworkError {
            message: e.to_string(),
        })?;

        load_chart(reference, bytes.to_vec())
    }
}
