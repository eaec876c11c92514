use std::{path::Path, time::Duration};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{CommandSpec, ExecError, run_command};

/// Creates and deletes throwaway clusters (`kind`).
#[derive(Debug, Clone)]
pub struct ClusterTool {
    binary: String,
}

impl ClusterTool {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Waits up to `wait` for the control plane before returning.
    pub fn create_spec(&self, name: &str, kubeconfig: &Path, wait: Duration) -> CommandSpec {
        CommandSpec::new(&self.binary)
            .args(["create", "cluster", "--name", name, "--kubeconfig"])
            .arg(kubeconfig.display().to_string())
            .args(["--wait".to_string(), format!("{}s", wait.as_secs())])
            // Headroom beyond the tool's own wait.
            .timeout(wait + Duration::from_secs(60))
    }

    pub fn delete_spec(&self, name: &str, kubeconfig: &Path) -> CommandSpec {
        CommandSpec::new(&self.binary)
            .args(["delete", "cluster", "--name", name, "--kubeconfig"])
            .arg(kubeconfig.display().to_string())
    }

    pub async fn create(
        &self,
        name: &str,
        kubeconfig: &Path,
        wait: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ExecError> {
        info!(cluster = name, "creating cluster");
        run_command(&self.create_spec(name, kubeconfig, wait), cancel).await?;
        Ok(())
    }

    pub async fn delete(
        &self,
        name: &str,
        kubeconfig: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), ExecError> {
        info!(cluster = name, "deleting cluster");
        run_command(&self.delete_spec(name, kubeconfig), cancel).await?;
        Ok(())
    }
}
