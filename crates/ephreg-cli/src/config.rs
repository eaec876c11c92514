use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use ephreg_model::ProvisionConfig;
use ephreg_observe::LoggerConfig;

/// Contents of the `--config` file: provisioning settings at the top level
/// plus an optional `logger:` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub provision: ProvisionConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
}

impl CliConfig {
    /// Defaults when no path is given; a given path must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_yaml::from_str(raw)?;
        cfg.provision.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ephreg_observe::LoggerFormat;

    #[test]
    fn provision_keys_sit_at_top_level() {
        let cfg = CliConfig::parse(
            "namespace: ci-registry\nlocal_port: 5443\nlogger:\n  format: json\n",
        )
        .unwrap();

        assert_eq!(cfg.provision.namespace, "ci-registry");
        assert_eq!(cfg.provision.local_port, 5443);
        assert_eq!(cfg.provision.cluster_name, "ephreg");
        assert_eq!(cfg.logger.format, LoggerFormat::Json);
    }

    #[test]
    fn invalid_namespace_is_rejected() {
        assert!(CliConfig::parse("namespace: Not_A_Label\n").is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::load(Some(&dir.path().join("absent.yaml"))).unwrap_err();
        assert!(err.to_string().contains("absent.yaml"), "{err}");
    }

    #[test]
    fn no_path_means_defaults() {
        let cfg = CliConfig::load(None).unwrap();
        assert_eq!(cfg.provision.namespace, "ephreg");
        assert_eq!(cfg.logger, LoggerConfig::default());
    }
}
