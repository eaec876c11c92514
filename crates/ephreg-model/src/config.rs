use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        RunNames,
        constants::{CREDENTIALS_FILE, REGISTRY_IMAGE, REGISTRY_PORT},
    },
    error::{ModelError, ModelResult},
};

/// Settings of one provisioning run.
///
/// Threaded explicitly through constructors; nothing here is read from or
/// written to process-global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    /// Name of the throwaway cluster.
    pub cluster_name: String,
    /// Namespace holding every registry object.
    pub namespace: String,
    /// Local directory for the kubeconfig, credential file and exported TLS files.
    pub work_dir: PathBuf,
    /// Explicit kubeconfig; defaults to `<work_dir>/kubeconfig`.
    pub kubeconfig: Option<PathBuf>,
    /// Hosts resolution file receiving the `127.0.0.1 <fqdn>` entry.
    pub hosts_file: PathBuf,
    /// Local end of the port-forward.
    pub local_port: u16,
    pub registry_image: String,
    /// `certs.d` directory the container engine reads per-registry CA files
    /// from. `null` leaves trusting the registry CA to the user.
    pub engine_certs_dir: Option<PathBuf>,
    /// Deadline for the registry deployment to report a ready replica.
    pub readiness_timeout_secs: u64,
    /// Deadline passed to the cluster tool for cluster bring-up.
    pub cluster_ready_timeout_secs: u64,
    pub tools: ToolsConfig,
    pub cert_manager: CertManagerConfig,
}

/// Binaries invoked at the subprocess boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub cluster: String,
    pub chart: String,
    pub kubectl: String,
    pub git: String,
    pub engine: String,
}

/// Chart coordinates of the certificate-management controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CertManagerConfig {
    pub release: String,
    pub namespace: String,
    pub chart: String,
    pub version: String,
    pub timeout_secs: u64,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            cluster_name: "ephreg".into(),
            namespace: "ephreg".into(),
            work_dir: PathBuf::from(".ephreg"),
            kubeconfig: None,
            hosts_file: PathBuf::from("/etc/hosts"),
            local_port: REGISTRY_PORT,
            registry_image: REGISTRY_IMAGE.into(),
            engine_certs_dir: Some(PathBuf::from("/etc/docker/certs.d")),
            readiness_timeout_secs: 60,
            cluster_ready_timeout_secs: 300,
            tools: ToolsConfig::default(),
            cert_manager: CertManagerConfig::default(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            cluster: "kind".into(),
            chart: "helm".into(),
            kubectl: "kubectl".into(),
            git: "git".into(),
            engine: "docker".into(),
        }
    }
}

impl Default for CertManagerConfig {
    fn default() -> Self {
        Self {
            release: "cert-manager".into(),
            namespace: "cert-manager".into(),
            chart: "oci://quay.io/jetstack/charts/cert-manager".into(),
            version: "v1.16.2".into(),
            timeout_secs: 300,
        }
    }
}

impl ProvisionConfig {
    /// Read and validate a YAML config file.
    pub fn load(path: &Path) -> ModelResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| ModelError::ConfigRead {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_yaml(&raw)
    }

    /// Parse and validate YAML; missing fields take their defaults.
    pub fn from_yaml(raw: &str) -> ModelResult<Self> {
        let cfg: Self = serde_yaml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ModelResult<()> {
        RunNames::new(&self.namespace)?;
        if self.cluster_name.trim().is_empty() {
            return Err(ModelError::InvalidConfig("cluster_name is empty".into()));
        }
        if self.local_port == 0 {
            return Err(ModelError::InvalidConfig("local_port cannot be zero".into()));
        }
        if self.readiness_timeout_secs == 0 {
            return Err(ModelError::InvalidConfig(
                "readiness_timeout_secs cannot be zero".into(),
            ));
        }
        if self.registry_image.trim().is_empty() {
            return Err(ModelError::InvalidConfig("registry_image is empty".into()));
        }
        Ok(())
    }

    pub fn names(&self) -> ModelResult<RunNames> {
        RunNames::new(&self.namespace)
    }

    pub fn kubeconfig_path(&self) -> PathBuf {
        self.kubeconfig
            .clone()
            .unwrap_or_else(|| self.work_dir.join("kubeconfig"))
    }

    pub fn credentials_file(&self) -> PathBuf {
        self.work_dir.join(CREDENTIALS_FILE)
    }

    pub fn tls_export_dir(&self) -> PathBuf {
        self.work_dir.join("tls")
    }

    /// Container-engine client config holding the registry login.
    pub fn engine_config_dir(&self) -> PathBuf {
        self.work_dir.join("engine")
    }

    /// `<engine_certs_dir>/<fqdn>:<local_port>`, where the engine looks for
    /// the CA of the forwarded registry.
    pub fn engine_ca_dir(&self, names: &RunNames) -> Option<PathBuf> {
        self.engine_certs_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}:{}", names.fqdn(), self.local_port)))
    }

    pub fn readiness_timeout(&self) -> Duration {
        Duration::from_secs(self.readiness_timeout_secs)
    }

    pub fn cluster_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.cluster_ready_timeout_secs)
    }
}

impl CertManagerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
