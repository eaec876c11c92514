//! Subcommand bodies. Each takes the shared [`RunContext`].
pub mod pull_secret;
pub mod push;
pub mod setup;
pub mod teardown;

use std::{path::Path, sync::Arc};

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ephreg_core::{
    cluster::ClusterHandle,
    installer::ControllerInstaller,
    metrics::{MetricsHandle, noop_metrics},
};
use ephreg_exec::{
    HostsFile,
    tools::{CertManagerChart, ChartManager, ClusterTool},
};
use ephreg_kube::{KubeCluster, create_client};
use ephreg_model::{ProvisionConfig, RunNames};
use ephreg_prometheus::PrometheusMetrics;

pub struct RunContext {
    pub config: ProvisionConfig,
    pub names: RunNames,
    pub cancel: CancellationToken,
    prometheus: Option<PrometheusMetrics>,
}

impl RunContext {
    pub fn new(
        config: ProvisionConfig,
        collect_metrics: bool,
        cancel: CancellationToken,
    ) -> anyhow::Result<Self> {
        let names = config.names()?;
        let prometheus = if collect_metrics {
            Some(PrometheusMetrics::new().context("registering metrics")?)
        } else {
            None
        };
        Ok(Self {
            config,
            names,
            cancel,
            prometheus,
        })
    }

    pub fn metrics(&self) -> MetricsHandle {
        match &self.prometheus {
            Some(m) => Arc::new(m.clone()),
            None => noop_metrics(),
        }
    }

    /// Client for the run's cluster, via the kubeconfig the cluster tool wrote.
    pub async fn cluster(&self) -> anyhow::Result<ClusterHandle> {
        let kubeconfig = self.config.kubeconfig_path();
        let client = create_client(Some(&kubeconfig))
            .await
            .with_context(|| format!("building cluster client from {}", kubeconfig.display()))?;
        Ok(Arc::new(KubeCluster::new(client)))
    }

    pub fn installer(&self) -> Arc<dyn ControllerInstaller> {
        let charts = ChartManager::new(&self.config.tools.chart, self.config.kubeconfig_path());
        Arc::new(CertManagerChart::new(charts, &self.config.cert_manager))
    }

    pub fn cluster_tool(&self) -> ClusterTool {
        ClusterTool::new(&self.config.tools.cluster)
    }

    pub fn hosts(&self) -> HostsFile {
        HostsFile::new(&self.config.hosts_file)
    }

    pub async fn write_metrics(&self, path: &Path) -> anyhow::Result<()> {
        let Some(metrics) = &self.prometheus else {
            return Ok(());
        };
        let text = metrics.encode_text().context("encoding metrics")?;
        tokio::fs::write(path, text)
            .await
            .with_context(|| format!("writing metrics to {}", path.display()))?;
        info!(path = %path.display(), "metrics written");
        Ok(())
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("namespace", &self.names.namespace())
            .field("metrics", &self.prometheus.is_some())
            .finish()
    }
}

/// Print teardown problems on stderr, one per line.
pub(crate) fn report_failures(header: &str, failures: &[String]) {
    if failures.is_empty() {
        debug!("{header}: nothing to report");
        return;
    }
    eprintln!("{header}:");
    for f in failures {
        eprintln!("  - {f}");
    }
}
