use thiserror::Error;

use crate::{cluster::ClusterError, installer::InstallError, store::StoreError};

#[derive(Debug, Error)]
pub enum StageError {
    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("cluster: {0}")]
    Cluster(#[from] ClusterError),

    #[error("creating {object} failed: {source}")]
    ResourceCreateFailed {
        object: String,
        #[source]
        source: ClusterError,
    },

    #[error("render failed: {0}")]
    Render(String),

    #[error("io error on {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("install: {0}")]
    Install(#[from] InstallError),

    #[error("stage task aborted: {0}")]
    Aborted(String),
}

impl StageError {
    pub(crate) fn create_failed(object: impl Into<String>, source: ClusterError) -> Self {
        StageError::ResourceCreateFailed {
            object: object.into(),
            source,
        }
    }

    pub(crate) fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        StageError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }

    /// True when the stage stopped because its cancellation token fired.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            StageError::Store(StoreError::Cancelled(_))
                | StageError::Install(InstallError::Cancelled(_))
        )
    }
}
