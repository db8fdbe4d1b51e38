//! Process exit codes
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Kubernetes error - no usable cluster configuration or client
pub const KUBE_ERROR: i32 = 2;

/// Chart source error - a chart downloader could not be built
pub const SOURCE_ERROR: i32 = 3;

/// Configuration error - invalid flags or environment (sysexits.h EX_CONFIG)
pub const CONFIG_ERROR: i32 = 78;
