//! Cluster API capability used by stages, readiness and teardown.
//!
//! Stages only see [`ClusterClient`]; the `kube`-backed implementation lives in
//! `ephreg-kube` and [`InMemoryCluster`] stands in for it in tests.
mod error;
pub use error::{ClusterError, ClusterResult};

mod object;
pub use object::{ClusterObject, ObjectKey, ObjectKind};

mod memory;
pub use memory::InMemoryCluster;

use std::sync::Arc;

use async_trait::async_trait;
use ephreg_model::Labels;
use tracing::debug;

/// Create, read, delete and list cluster objects.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Create `obj`; fails with [`ClusterError::AlreadyExists`] when present.
    async fn create(&self, obj: ClusterObject) -> ClusterResult<ClusterObject>;

    async fn get(&self, key: &ObjectKey) -> ClusterResult<ClusterObject>;

    /// Delete the object; fails with [`ClusterError::NotFound`] when absent.
    async fn delete(&self, key: &ObjectKey) -> ClusterResult<()>;

    /// Keys of objects of `kind` whose labels match `selector`.
    ///
    /// `namespace = None` lists across all namespaces.
    async fn list(
        &self,
        kind: ObjectKind,
        namespace: Option<&str>,
        selector: &Labels,
    ) -> ClusterResult<Vec<ObjectKey>>;

    /// Ready replica count reported in the deployment status.
    async fn deployment_ready_replicas(&self, namespace: &str, name: &str) -> ClusterResult<i32> {
        let key = ObjectKey::namespaced(ObjectKind::Deployment, namespace, name);
        let obj = self.get(&key).await?;
        let deployment = obj
            .as_deployment()
            .ok_or_else(|| ClusterError::Invalid(format!("{key} is not a deployment")))?;
        Ok(deployment
            .status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0))
    }
}

/// Shared handle to a cluster client.
pub type ClusterHandle = Arc<dyn ClusterClient>;

/// Create `obj`, treating an existing object as success.
pub async fn ensure_created(cluster: &dyn ClusterClient, obj: ClusterObject) -> ClusterResult<()> {
    match cluster.create(obj).await {
        Ok(created) => {
            if let Ok(key) = created.key() {
                debug!(object = %key, "created");
            }
            Ok(())
        }
        Err(ClusterError::AlreadyExists(what)) => {
            debug!(object = %what, "already exists; keeping it");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Delete `key`, treating a missing object as success. Returns whether it existed.
pub async fn delete_if_present(
    cluster: &dyn ClusterClient,
    key: &ObjectKey,
) -> ClusterResult<bool> {
    match cluster.delete(key).await {
        Ok(()) => Ok(true),
        Err(ClusterError::NotFound(_)) => {
            debug!(object = %key, "already gone");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
