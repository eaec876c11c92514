use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use ephreg_core::installer::{ControllerInstaller, InstallError};
use ephreg_model::CertManagerConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{CommandSpec, ExecError, run_command};

/// A chart release and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    pub name: String,
    pub chart: String,
    pub namespace: String,
    pub version: String,
    pub timeout: Duration,
}

impl From<&CertManagerConfig> for Release {
    fn from(cfg: &CertManagerConfig) -> Self {
        Self {
            name: cfg.release.clone(),
            chart: cfg.chart.clone(),
            namespace: cfg.namespace.clone(),
            version: cfg.version.clone(),
            timeout: cfg.timeout(),
        }
    }
}

/// Installs and removes chart releases (`helm`).
#[derive(Debug, Clone)]
pub struct ChartManager {
    binary: String,
    kubeconfig: PathBuf,
}

impl ChartManager {
    pub fn new(binary: impl Into<String>, kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            kubeconfig: kubeconfig.into(),
        }
    }

    fn base(&self) -> CommandSpec {
        CommandSpec::new(&self.binary)
            .arg("--kubeconfig")
            .arg(self.kubeconfig.display().to_string())
    }

    /// `upgrade --install`, creating the namespace and waiting for the
    /// release's workloads to become ready.
    pub fn upgrade_install_spec(&self, release: &Release, values: &[(&str, &str)]) -> CommandSpec {
        let mut spec = self
            .base()
            .args(["upgrade", "--install", release.name.as_str(), release.chart.as_str()])
            .args(["--namespace", release.namespace.as_str(), "--create-namespace"])
            .args(["--version", release.version.as_str()])
            .args(wait_args(release.timeout));
        for (key, value) in values {
            spec = spec.arg("--set").arg(format!("{key}={value}"));
        }
        spec.timeout(release.timeout + Duration::from_secs(30))
    }

    pub fn uninstall_spec(&self, release: &Release) -> CommandSpec {
        self.base()
            .args(["uninstall", release.name.as_str(), "--namespace", release.namespace.as_str()])
            .args(wait_args(release.timeout))
            .timeout(release.timeout + Duration::from_secs(30))
    }

    pub async fn upgrade_install(
        &self,
        release: &Release,
        values: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<(), ExecError> {
        run_command(&self.upgrade_install_spec(release, values), cancel).await?;
        Ok(())
    }

    pub async fn uninstall(
        &self,
        release: &Release,
        cancel: &CancellationToken,
    ) -> Result<(), ExecError> {
        run_command(&self.uninstall_spec(release), cancel).await?;
        Ok(())
    }
}

fn wait_args(timeout: Duration) -> [String; 3] {
    [
        "--wait".to_string(),
        "--timeout".to_string(),
        format!("{}s", timeout.as_secs()),
    ]
}

/// The certificate controller, installed as a chart release.
#[derive(Debug, Clone)]
pub struct CertManagerChart {
    charts: ChartManager,
    release: Release,
}

impl CertManagerChart {
    pub fn new(charts: ChartManager, config: &CertManagerConfig) -> Self {
        Self {
            charts,
            release: Release::from(config),
        }
    }

    fn install_outcome(&self, res: Result<(), ExecError>) -> Result<(), InstallError> {
        res.map_err(|e| match e {
            ExecError::Cancelled(_) => InstallError::Cancelled(self.release.name.clone()),
            e => InstallError::Failed {
                name: self.release.name.clone(),
                reason: e.to_string(),
            },
        })
    }

    fn uninstall_outcome(&self, res: Result<(), ExecError>) -> Result<(), InstallError> {
        match res {
            Err(ExecError::SubprocessFailed { output, .. }) if output.contains("not found") => {
                debug!(release = %self.release.name, "release not installed");
                Err(InstallError::NotInstalled(self.release.name.clone()))
            }
            other => self.install_outcome(other),
        }
    }
}

#[async_trait]
impl ControllerInstaller for CertManagerChart {
    fn name(&self) -> &str {
        &self.release.name
    }

    async fn install(&self, cancel: &CancellationToken) -> Result<(), InstallError> {
        info!(release = %self.release.name, version = %self.release.version, "installing chart");
        let res = self
            .charts
            .upgrade_install(&self.release, &[("crds.enabled", "true")], cancel)
            .await;
        self.install_outcome(res)
    }

    async fn uninstall(&self, cancel: &CancellationToken) -> Result<(), InstallError> {
        let res = self.charts.uninstall(&self.release, cancel).await;
        self.uninstall_outcome(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart() -> CertManagerChart {
        CertManagerChart::new(
            ChartManager::new("helm", "/w/kubeconfig"),
            &CertManagerConfig::default(),
        )
    }

    #[test]
    fn install_spec_waits_and_sets_values() {
        let spec = chart()
            .charts
            .upgrade_install_spec(&chart().release, &[("crds.enabled", "true")]);
        assert_eq!(
            spec.to_string(),
            "helm --kubeconfig /w/kubeconfig upgrade --install cert-manager \
             oci://quay.io/jetstack/charts/cert-manager --namespace cert-manager \
             --create-namespace --version v1.16.2 --wait --timeout 300s --set crds.enabled=true"
        );
        assert_eq!(spec.time_limit(), Some(Duration::from_secs(330)));
    }

    #[test]
    fn missing_release_maps_to_not_installed() {
        let chart = chart();
        let missing = Err(ExecError::SubprocessFailed {
            program: "helm".into(),
            code: Some(1),
            output: "Error: uninstall: Release not loaded: cert-manager: release: not found".into(),
        });
        assert_eq!(
            chart.uninstall_outcome(missing),
            Err(InstallError::NotInstalled("cert-manager".into()))
        );

        let locked = Err(ExecError::SubprocessFailed {
            program: "helm".into(),
            code: Some(1),
            output: "another operation is in progress".into(),
        });
        assert!(matches!(
            chart.uninstall_outcome(locked),
            Err(InstallError::Failed { .. })
        ));
        assert_eq!(chart.uninstall_outcome(Ok(())), Ok(()));
    }

    #[test]
    fn killed_install_maps_to_cancelled() {
        let chart = chart();
        assert_eq!(
            chart.install_outcome(Err(ExecError::Cancelled("helm".into()))),
            Err(InstallError::Cancelled("cert-manager".into()))
        );
    }
}
