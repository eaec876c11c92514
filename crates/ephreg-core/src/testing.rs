//! Test doubles shared by unit tests across modules.
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use ephreg_model::RunNames;
use tokio_util::sync::CancellationToken;

use crate::{
    cluster::{ClusterObject, InMemoryCluster},
    installer::{ControllerInstaller, InstallError},
    stage::StageContext,
    store::ValueStore,
};

#[derive(Default)]
pub(crate) struct FakeInstaller {
    pub installs: AtomicUsize,
    pub uninstalls: AtomicUsize,
    pub fail_install: bool,
    pub fail_uninstall: bool,
}

impl FakeInstaller {
    pub fn failing_install() -> Self {
        Self {
            fail_install: true,
            ..Default::default()
        }
    }

    pub fn failing_uninstall() -> Self {
        Self {
            fail_uninstall: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl ControllerInstaller for FakeInstaller {
    fn name(&self) -> &str {
        "fake-cert-manager"
    }

    async fn install(&self, _cancel: &CancellationToken) -> Result<(), InstallError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        if self.fail_install {
            return Err(InstallError::Failed {
                name: self.name().into(),
                reason: "chart repo unreachable".into(),
            });
        }
        Ok(())
    }

    async fn uninstall(&self, _cancel: &CancellationToken) -> Result<(), InstallError> {
        self.uninstalls.fetch_add(1, Ordering::SeqCst);
        if self.fail_uninstall {
            return Err(InstallError::Failed {
                name: self.name().into(),
                reason: "release locked".into(),
            });
        }
        Ok(())
    }
}

/// Install that only finishes when cancelled, like a chart waiting on
/// workloads that never become ready.
pub(crate) struct HangingInstaller;

#[async_trait]
impl ControllerInstaller for HangingInstaller {
    fn name(&self) -> &str {
        "hanging-cert-manager"
    }

    async fn install(&self, cancel: &CancellationToken) -> Result<(), InstallError> {
        tokio::select! {
            _ = cancel.cancelled() => Err(InstallError::Cancelled(self.name().into())),
            _ = tokio::time::sleep(std::time::Duration::from_secs(300)) => Ok(()),
        }
    }

    async fn uninstall(&self, _cancel: &CancellationToken) -> Result<(), InstallError> {
        Ok(())
    }
}

/// Cluster with the run namespace already present.
pub(crate) fn cluster_with_namespace(ns: &str) -> Arc<InMemoryCluster> {
    let cluster = Arc::new(InMemoryCluster::new());
    cluster
        .insert(ClusterObject::namespace(ns))
        .expect("namespace object is valid");
    cluster
}

pub(crate) fn stage_context(cluster: Arc<InMemoryCluster>, ns: &str) -> StageContext {
    StageContext::new(
        Arc::new(ValueStore::for_provisioning()),
        cluster,
        RunNames::new(ns).expect("valid namespace"),
    )
}
