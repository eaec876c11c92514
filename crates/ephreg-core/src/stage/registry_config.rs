//! Registry configuration rendered from the published mounts.
use std::collections::BTreeMap;

use async_trait::async_trait;
use ephreg_model::{
    ConfigRef, Labels, Mount, RunNames, TlsMounts,
    constants::{CONFIG_FILE, REGISTRY_PORT, STORAGE_ROOT},
};
use k8s_openapi::{api::core::v1::ConfigMap, apimachinery::pkg::apis::meta::v1::ObjectMeta};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    cluster::{ClusterObject, ensure_created},
    stage::{Stage, StageContext, StageError},
    store::keys::{CREDENTIALS_MOUNT, REGISTRY_CONFIG, TLS_MOUNTS},
};

const AUTH_REALM: &str = "ephreg";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub version: String,
    pub auth: Auth,
    pub http: Http,
    pub storage: Storage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Auth {
    pub htpasswd: Htpasswd,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Htpasswd {
    pub realm: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Http {
    pub addr: String,
    pub host: String,
    pub tls: HttpTls,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpTls {
    pub certificate: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Storage {
    pub filesystem: Filesystem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filesystem {
    pub rootdirectory: String,
}

impl RegistryConfig {
    pub fn new(names: &RunNames, credentials: &Mount, tls: &TlsMounts) -> Self {
        Self {
            version: "0.1".into(),
            auth: Auth {
                htpasswd: Htpasswd {
                    realm: AUTH_REALM.into(),
                    path: credentials.path(),
                },
            },
            http: Http {
                addr: format!(":{REGISTRY_PORT}"),
                host: format!("https://{}", names.registry_host()),
                tls: HttpTls {
                    certificate: tls.cert.path(),
                    key: tls.key.path(),
                },
            },
            storage: Storage {
                filesystem: Filesystem {
                    rootdirectory: STORAGE_ROOT.into(),
                },
            },
        }
    }
}

/// Render the registry configuration document.
pub fn render_config(
    names: &RunNames,
    credentials: &Mount,
    tls: &TlsMounts,
) -> Result<String, StageError> {
    serde_yaml::to_string(&RegistryConfig::new(names, credentials, tls))
        .map_err(|e| StageError::Render(e.to_string()))
}

/// Renders the configuration once the credential and TLS mounts are known and
/// stores it as a config object.
///
/// Publishes [`REGISTRY_CONFIG`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryConfigStage;

impl RegistryConfigStage {
    /// Wait for both mount descriptors and render the document.
    pub async fn render(&self, ctx: &StageContext) -> Result<String, StageError> {
        let credentials = CREDENTIALS_MOUNT.wait(ctx.store(), ctx.cancel()).await?;
        let tls = TLS_MOUNTS.wait(ctx.store(), ctx.cancel()).await?;
        debug!(credentials = %credentials, cert = %tls.cert, "mounts available");
        render_config(ctx.names(), &credentials, &tls)
    }
}

#[async_trait]
impl Stage for RegistryConfigStage {
    fn name(&self) -> &'static str {
        "registry-config"
    }

    #[instrument(level = "debug", skip_all, fields(stage = "registry-config"))]
    async fn run(&self, ctx: &StageContext) -> Result<(), StageError> {
        let rendered = self.render(ctx).await?;
        let names = ctx.names();

        let config_map = ClusterObject::ConfigMap(ConfigMap {
            metadata: ObjectMeta {
                name: Some(names.config_object().to_string()),
                namespace: Some(names.namespace().to_string()),
                labels: Some(Labels::managed().into_inner()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(CONFIG_FILE.to_string(), rendered)])),
            ..Default::default()
        });
        ensure_created(ctx.cluster().as_ref(), config_map)
            .await
            .map_err(|e| StageError::create_failed(names.config_object(), e))?;

        REGISTRY_CONFIG.set(ctx.store(), ConfigRef::new(names.config_object()))?;
        info!(config = names.config_object(), "registry config stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use ephreg_model::constants::{CREDENTIALS_MOUNT_DIR, HTPASSWD_FILE};

    use crate::{
        cluster::{ObjectKey, ObjectKind},
        testing::{cluster_with_namespace, stage_context},
    };

    fn creds_mount() -> Mount {
        Mount::new(CREDENTIALS_MOUNT_DIR, HTPASSWD_FILE)
    }

    #[test]
    fn rendered_document_has_expected_keys() {
        let names = RunNames::new("reg").unwrap();
        let yaml = render_config(&names, &creds_mount(), &TlsMounts::default()).unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(doc["auth"]["htpasswd"]["path"].as_str(), Some("/auth/htpasswd"));
        assert_eq!(doc["http"]["addr"].as_str(), Some(":5000"));
        assert_eq!(
            doc["http"]["host"].as_str(),
            Some("https://registry.reg.svc.cluster.local:5000")
        );
        assert_eq!(doc["http"]["tls"]["certificate"].as_str(), Some("/certs/tls.crt"));
        assert_eq!(doc["http"]["tls"]["key"].as_str(), Some("/certs/tls.key"));
        assert_eq!(
            doc["storage"]["filesystem"]["rootdirectory"].as_str(),
            Some("/var/lib/registry")
        );
    }

    #[tokio::test]
    async fn render_blocks_until_both_mounts_are_published() {
        let ctx = stage_context(cluster_with_namespace("reg"), "reg");

        let render = {
            let ctx = ctx.clone();
            tokio::spawn(async move { RegistryConfigStage.render(&ctx).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!render.is_finished());

        CREDENTIALS_MOUNT.set(ctx.store(), creds_mount()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!render.is_finished());

        TLS_MOUNTS.set(ctx.store(), TlsMounts::default()).unwrap();
        let yaml = tokio::time::timeout(Duration::from_secs(2), render)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(yaml.contains("/certs/tls.crt"));
    }

    #[tokio::test]
    async fn run_stores_config_object_and_publishes() {
        let cluster = cluster_with_namespace("reg");
        let ctx = stage_context(cluster.clone(), "reg");
        CREDENTIALS_MOUNT.set(ctx.store(), creds_mount()).unwrap();
        TLS_MOUNTS.set(ctx.store(), TlsMounts::default()).unwrap();

        RegistryConfigStage.run(&ctx).await.unwrap();

        let key = ObjectKey::namespaced(ObjectKind::ConfigMap, "reg", "registry-config");
        let obj = cluster.object(&key).unwrap();
        let data = obj.as_config_map().unwrap().data.as_ref().unwrap();
        assert!(data["config.yml"].contains("rootdirectory"));

        let published = REGISTRY_CONFIG.wait(ctx.store(), ctx.cancel()).await.unwrap();
        assert_eq!(published.name(), "registry-config");
    }

    #[tokio::test]
    async fn cancelled_render_reports_cancellation() {
        let ctx = stage_context(cluster_with_namespace("reg"), "reg");
        ctx.cancel().cancel();

        let err = RegistryConfigStage.render(&ctx).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
