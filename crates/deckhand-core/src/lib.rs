//! Deckhand Core - Core types for the Helm release operator
//!
//! This crate provides the foundational types used throughout Deckhand:
//! - `HelmRelease`: The custom resource declaring a desired release
//! - `ReleaseCondition`: The single current status condition
//! - `ReleaseStatusCode`/`StatusReason`: The backend status vocabulary
//! - `FinalizerSet`: Ordered finalizer tags
//! - `Chart`: A packed chart loaded into memory

pub mod annotations;
pub mod chart;
pub mod error;
pub mod finalizer;
pub mod release;
pub mod resource;

pub use chart::{Chart, ChartMetadata, create_archive};
pub use error::{CoreError, Result};
pub use finalizer::{FinalizerSet, RELEASE_FINALIZER};
pub use release::{ReleaseStatusCode, StatusReason};
pub use resource::{
    API_GROUP, ChartSpec, HelmRelease, HelmReleaseSpec, HelmReleaseStatus, ReleaseCondition,
    ResourceKey,
};
