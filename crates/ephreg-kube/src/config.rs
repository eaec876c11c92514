use std::{path::Path, time::Duration};

use kube::{
    Client, Config,
    config::{KubeConfigOptions, Kubeconfig},
};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum KubeError {
    #[error("failed to read kubeconfig {path}: {reason}")]
    Kubeconfig { path: String, reason: String },

    #[error("failed to load client config: {0}")]
    Config(String),

    #[error("failed to create client: {0}")]
    Client(String),
}

/// Build a client from `kubeconfig`, or from the inferred environment config
/// when no path is given.
pub async fn create_client(kubeconfig: Option<&Path>) -> Result<Client, KubeError> {
    let mut config = match kubeconfig {
        Some(path) => {
            debug!(kubeconfig = %path.display(), "loading kubeconfig");
            let raw = Kubeconfig::read_from(path).map_err(|e| KubeError::Kubeconfig {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            Config::from_custom_kubeconfig(raw, &KubeConfigOptions::default())
                .await
                .map_err(|e| KubeError::Config(e.to_string()))?
        }
        None => Config::infer()
            .await
            .map_err(|e| KubeError::Config(e.to_string()))?,
    };
    config.connect_timeout = Some(DEFAULT_CONNECT_TIMEOUT);
    config.read_timeout = Some(DEFAULT_READ_TIMEOUT);

    Client::try_from(config).map_err(|e| KubeError::Client(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_kubeconfig_is_reported_with_path() {
        let res = create_client(Some(Path::new("/nonexistent/ephreg/kubeconfig"))).await;
        match res {
            Err(KubeError::Kubeconfig { path, .. }) => {
                assert_eq!(path, "/nonexistent/ephreg/kubeconfig")
            }
            Err(other) => panic!("expected kubeconfig error, got {other:?}"),
            Ok(_) => panic!("client built from a missing kubeconfig"),
        }
    }
}
