//! Deckhand Chart Downloading
//!
//! This crate resolves chart references to loaded charts:
//!
//! - **Object storage**: `s3://bucket/prefix/chart` via the AWS SDK
//! - **HTTP servers**: `https://host/path/chart`
//! - **Local files**: `file:///dir/chart`, for development
//!
//! A [`DownloaderRegistry`] maps URL schemes to downloaders. It is built
//! once at startup and is itself a [`ChartDownloader`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use deckhand_repo::{ChartDownloader, ChartReference, DownloaderRegistry, FileDownloader};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = DownloaderRegistry::new().register("file", FileDownloader::new());
//!
//! let reference = ChartReference::parse("file:///srv/charts/nginx", "1.2.3")?;
//! let chart = registry.download(&reference).await?;
//! println!("{} {}", chart.name(), chart.version());
//! # Ok(())
//! # }
//! ```

pub mod downloader;
pub mod error;
pub mod file;
pub mod http;
pub mod mock;
pub mod reference;
pub mod s3;

// Re-exports for convenience
pub use downloader::{ChartDownloader, DEFAULT_DOWNLOAD_TIMEOUT, DownloaderRegistry};
pub use error::{RepoError, Result};
pub use file::FileDownloader;
pub use http::HttpDownloader;
pub use mock::MockChartDownloader;
pub use reference::ChartReference;
pub use s3::{ObjectFetcher, S3Downloader, load_sdk_config, object_location};
