//! Cluster controller installation capability.
use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InstallError {
    #[error("installing '{name}' failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("'{0}' is not installed")]
    NotInstalled(String),

    #[error("'{0}' cancelled")]
    Cancelled(String),
}

/// Installs and removes a cluster-wide controller (the certificate manager).
///
/// `install` must be idempotent: an existing installation is success. Both
/// operations abort with [`InstallError::Cancelled`] once `cancel` fires.
#[async_trait]
pub trait ControllerInstaller: Send + Sync {
    fn name(&self) -> &str;

    async fn install(&self, cancel: &CancellationToken) -> Result<(), InstallError>;

    /// Remove the controller; [`InstallError::NotInstalled`] counts as success
    /// for teardown.
    async fn uninstall(&self, cancel: &CancellationToken) -> Result<(), InstallError>;
}
