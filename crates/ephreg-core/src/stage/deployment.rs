//! Registry service and workload.
use async_trait::async_trait;
use ephreg_model::{
    Labels,
    constants::{CONFIG_MOUNT_DIR, LABEL_APP, REGISTRY_PORT},
};
use k8s_openapi::{
    api::{
        apps::v1::Deployment,
        core::v1::{Service, ServicePort, ServiceSpec},
    },
    apimachinery::pkg::{apis::meta::v1::ObjectMeta, util::intstr::IntOrString},
};
use serde_json::json;
use tracing::{info, instrument};

use crate::{
    cluster::{ClusterObject, ensure_created},
    stage::{Stage, StageContext, StageError},
    store::keys::{CREDENTIALS_MOUNT, CREDENTIALS_SECRET, REGISTRY_CONFIG, TLS_MOUNTS, TLS_SECRET},
};

/// Creates the registry service and its single-replica deployment once the
/// secrets and config object it mounts are published.
#[derive(Debug, Clone)]
pub struct DeploymentStage {
    image: String,
}

/// Everything the workload mounts, as published by the other stages.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WorkloadInputs {
    credentials_secret: String,
    credentials_dir: String,
    tls_secret: String,
    tls_dir: String,
    config_object: String,
}

impl DeploymentStage {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
        }
    }

    /// Wait for the published dependencies, then create namespace, service
    /// and deployment. Existing objects are kept.
    pub async fn deploy(&self, ctx: &StageContext) -> Result<(), StageError> {
        let store = ctx.store();
        let cancel = ctx.cancel();
        let inputs = WorkloadInputs {
            credentials_secret: CREDENTIALS_SECRET.wait(store, cancel).await?.0,
            tls_secret: TLS_SECRET.wait(store, cancel).await?.0,
            tls_dir: TLS_MOUNTS.wait(store, cancel).await?.key.dir().to_string(),
            credentials_dir: CREDENTIALS_MOUNT.wait(store, cancel).await?.dir().to_string(),
            config_object: REGISTRY_CONFIG.wait(store, cancel).await?.0,
        };

        let names = ctx.names();
        let cluster = ctx.cluster().as_ref();

        ensure_created(cluster, ClusterObject::namespace(names.namespace()))
            .await
            .map_err(|e| StageError::create_failed(names.namespace(), e))?;

        ensure_created(cluster, self.service(ctx))
            .await
            .map_err(|e| StageError::create_failed(names.service(), e))?;

        ensure_created(cluster, self.deployment(ctx, &inputs)?)
            .await
            .map_err(|e| StageError::create_failed(names.deployment(), e))?;

        info!(
            deployment = names.deployment(),
            image = %self.image,
            "registry workload created"
        );
        Ok(())
    }

    fn labels(&self, ctx: &StageContext) -> Labels {
        let mut labels = Labels::managed();
        labels.insert(LABEL_APP, ctx.names().deployment());
        labels
    }

    fn service(&self, ctx: &StageContext) -> ClusterObject {
        let names = ctx.names();
        let mut selector = Labels::new();
        selector.insert(LABEL_APP, names.deployment());

        ClusterObject::Service(Service {
            metadata: ObjectMeta {
                name: Some(names.service().to_string()),
                namespace: Some(names.namespace().to_string()),
                labels: Some(self.labels(ctx).into_inner()),
                ..Default::default()
            },
            spec: Some(ServiceSpec {
                selector: Some(selector.into_inner()),
                ports: Some(vec![ServicePort {
                    name: Some("https".to_string()),
                    port: i32::from(REGISTRY_PORT),
                    target_port: Some(IntOrString::Int(i32::from(REGISTRY_PORT))),
                    protocol: Some("TCP".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn deployment(
        &self,
        ctx: &StageContext,
        inputs: &WorkloadInputs,
    ) -> Result<ClusterObject, StageError> {
        let names = ctx.names();
        let labels = self.labels(ctx).into_inner();
        let port = i32::from(REGISTRY_PORT);

        let manifest = json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {
                "name": names.deployment(),
                "namespace": names.namespace(),
                "labels": labels,
            },
            "spec": {
                "replicas": 1,
                "selector": { "matchLabels": { LABEL_APP: names.deployment() } },
                "template": {
                    "metadata": { "labels": labels },
                    "spec": {
                        "containers": [{
                            "name": names.deployment(),
                            "image": self.image,
                            "ports": [{ "containerPort": port, "protocol": "TCP" }],
                            "readinessProbe": {
                                "tcpSocket": { "port": port },
                                "periodSeconds": 2,
                            },
                            "volumeMounts": [
                                { "name": "credentials", "mountPath": inputs.credentials_dir, "readOnly": true },
                                { "name": "config", "mountPath": CONFIG_MOUNT_DIR, "readOnly": true },
                                { "name": "tls", "mountPath": inputs.tls_dir, "readOnly": true },
                            ],
                        }],
                        "volumes": [
                            { "name": "credentials", "secret": { "secretName": inputs.credentials_secret } },
                            { "name": "config", "configMap": { "name": inputs.config_object } },
                            { "name": "tls", "secret": { "secretName": inputs.tls_secret } },
                        ],
                    },
                },
            },
        });

        let deployment: Deployment =
            serde_json::from_value(manifest).map_err(|e| StageError::Render(e.to_string()))?;
        Ok(ClusterObject::Deployment(deployment))
    }
}

#[async_trait]
impl Stage for DeploymentStage {
    fn name(&self) -> &'static str {
        "deployment"
    }

    #[instrument(level = "debug", skip_all, fields(stage = "deployment"))]
    async fn run(&self, ctx: &StageContext) -> Result<(), StageError> {
        self.deploy(ctx).await
    }
}
