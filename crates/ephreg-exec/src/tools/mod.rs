//! Thin wrappers over the external binaries the CLI drives.
mod engine;
pub use engine::ContainerEngine;

mod git;
pub use git::VersionControl;

mod helm;
pub use helm::{CertManagerChart, ChartManager};

mod kind;
pub use kind::ClusterTool;
