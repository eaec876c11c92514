//! [`ClusterClient`](ephreg_core::cluster::ClusterClient) backed by the
//! Kubernetes API via `kube`.
mod client;
pub use client::{KubeCluster, map_kube_error};

mod config;
pub use config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT, KubeError, create_client};
