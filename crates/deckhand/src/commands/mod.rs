//! CLI commands

pub mod crd;
pub mod run;
