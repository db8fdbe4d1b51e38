//! Object storage (S3) chart downloader
//!
//! `s3://<bucket>/<prefix>/<chart>` at version `v` is read from bucket
//! `<bucket>`, key `<prefix>/<chart>-<v>.tgz`. The object is buffered in
//! memory before decoding.

use async_trait::async_trait;
use aws_config::SdkConfig;
use deckhand_core::Chart;

use crate::downloader::{ChartDownloader, load_chart};
use crate::error::{RepoError, Result};
use crate::reference::ChartReference;

/// Reads whole objects from a bucket
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl ObjectFetcher for aws_sdk_s3::Client {
    async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let object_error = |message: String| RepoError::ObjectStore {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message,
        };

        let output = self
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    object_error("object does not exist".to_string())
                } else {
                    object_error(aws_sdk_s3::error::DisplayErrorContext(&e).to_string())
                }
            })?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| object_error(e.to_string()))?;

        Ok(data.into_bytes().to_vec())
    }
}

/// Build an SDK configuration from the default provider chain
pub async fn load_sdk_config(region: Option<String>) -> SdkConfig {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region));
    }
    loader.load().await
}

/// Split a reference into bucket and object key
pub fn object_location(reference: &ChartReference) -> Result<(String, String)> {
    let bucket = reference
        .host()
        .ok_or_else(|| RepoError::InvalidRepositoryUrl {
            url: reference.url().to_string(),
            reason: "missing bucket name".to_string(),
        })?;

    Ok((bucket.to_string(), reference.archive_path()))
}

/// Chart downloader backed by object storage
pub struct S3Downloader<F = aws_sdk_s3::Client> {
    fetcher: F,
}

impl S3Downloader<aws_sdk_s3::Client> {
    /// Create a downloader using the AWS SDK client
    pub fn from_config(config: &SdkConfig) -> Self {
        Self::new(aws_sdk_s3::Client::new(config))
    }
}

impl<F: ObjectFetcher> S3Downloader<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl<F: ObjectFetcher> ChartDownloader for S3Downloader<F> {
    async fn download(&self, reference: &ChartReference) -> Result<Chart> {
        let (bucket, key) = object_location(reference)?;
        tracing::debug!(%bucket, %key, "fetching chart object");

        let data = self.fetcher.fetch(&bucket, &key).await?;
        load_chart(reference, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deckhand_core::create_archive;
    use std::collections::HashMap;

    #[derive(Default)]
    struct MemoryBucket {
        objects: HashMap<(String, String), Vec<u8>>,
    }

    impl MemoryBucket {
        fn with_object(mut self, bucket: &str, key: &str, data: Vec<u8>) -> Self {
            self.objects
                .insert((bucket.to_string(), key.to_string()), data);
            self
        }
    }

    #[async_trait]
    impl ObjectFetcher for MemoryBucket {
        async fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
            self.objects
                .get(&(bucket.to_string(), key.to_string()))
                .cloned()
                .ok_or_else(|| RepoError::ObjectStore {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    message: "object does not exist".to_string(),
                })
        }
    }

    fn chart_archive(name: &str, version: &str) -> Vec<u8> {
        let chart_yaml = format!("name: {}\nversion: {}\n", name, version);
        create_archive(name, &[("Chart.yaml", chart_yaml.as_str())]).unwrap()
    }

    #[test]
    fn test_object_location() {
        let reference = ChartReference::parse("s3://my-charts/stable/nginx", "1.2.3").unwrap();
        let (bucket, key) = object_location(&reference).unwrap();
        assert_eq!(bucket, "my-charts");
        assert_eq!(key, "stable/nginx-1.2.3.tgz");

        let reference = ChartReference::parse("s3://my-charts/nginx", "0.1.0").unwrap();
        assert_eq!(object_location(&reference).unwrap().1, "nginx-0.1.0.tgz");
    }

    #[test]
    fn test_object_key_is_not_percent_encoded() {
        let reference = ChartReference::parse("s3://charts/team a/nginx", "1.0.0").unwrap();
        let (bucket, key) = object_location(&reference).unwrap();
        assert_eq!(bucket, "charts");
        assert_eq!(key, "team a/nginx-1.0.0.tgz");
    }

    #[test]
    fn test_object_location_requires_bucket() {
        let reference = ChartReference::parse("s3:///stable/nginx", "1.0.0").unwrap();
        assert!(matches!(
            object_location(&reference),
            Err(RepoError::InvalidRepositoryUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_download_from_bucket() {
        let bucket = MemoryBucket::default().with_object(
            "my-charts",
            "stable/nginx-1.2.3.tgz",
            chart_archive("nginx", "1.2.3"),
        );
        let downloader = S3Downloader::new(bucket);

        let reference = ChartReference::parse("s3://my-charts/stable/nginx", "1.2.3").unwrap();
        let chart = downloader.download(&reference).await.unwrap();

        assert_eq!(chart.name(), "nginx");
        assert_eq!(chart.version().to_string(), "1.2.3");
    }

    #[tokio::test]
    async fn test_missing_object() {
        let downloader = S3Downloader::new(MemoryBucket::default());

        let reference = ChartReference::parse("s3://my-charts/stable/nginx", "9.9.9").unwrap();
        let err = downloader.download(&reference).await.unwrap_err();

        assert!(err.to_string().contains("s3://my-charts/stable/nginx-9.9.9.tgz"));
    }

    #[tokio::test]
    async fn test_corrupt_object_is_wrapped() {
        let bucket = MemoryBucket::default().with_object(
            "my-charts",
            "nginx-1.0.0.tgz",
            b"not an archive".to_vec(),
        );
        let downloader = S3Downloader::new(bucket);

        let reference = ChartReference::parse("s3://my-charts/nginx", "1.0.0").unwrap();
        let err = downloader.download(&reference).await.unwrap_err();

        assert!(matches!(err, RepoError::InvalidChart { ref name, .. } if name == "nginx"));
    }
}
