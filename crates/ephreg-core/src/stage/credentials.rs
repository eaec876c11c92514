//! Registry credentials: generated once per run, kept locally and in a secret.
use std::{collections::BTreeMap, path::PathBuf};

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use ephreg_model::{
    Credentials, Labels, Mount, RunNames, SecretRef,
    constants::{CREDENTIALS_MOUNT_DIR, HTPASSWD_FILE, LABEL_PULL_SECRET, PULL_SECRET_NAME},
};
use k8s_openapi::{
    ByteString, api::core::v1::Secret, apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use serde_json::json;
use tracing::{debug, info, instrument};

use crate::{
    cluster::{ClusterClient, ClusterError, ClusterObject, ObjectKey, ObjectKind},
    fsutil,
    stage::{Stage, StageContext, StageError},
    store::keys::{CREDENTIALS_MOUNT, CREDENTIALS_SECRET},
};

const USERNAME_KEY: &str = "username";
const PASSWORD_KEY: &str = "password";

/// Generates credentials, persists them and publishes where they live.
///
/// Publishes [`CREDENTIALS_SECRET`] and [`CREDENTIALS_MOUNT`].
#[derive(Debug, Clone)]
pub struct CredentialStage {
    credentials_file: PathBuf,
}

impl CredentialStage {
    pub fn new(credentials_file: impl Into<PathBuf>) -> Self {
        Self {
            credentials_file: credentials_file.into(),
        }
    }
}

#[async_trait]
impl Stage for CredentialStage {
    fn name(&self) -> &'static str {
        "credentials"
    }

    #[instrument(level = "debug", skip_all, fields(stage = "credentials"))]
    async fn run(&self, ctx: &StageContext) -> Result<(), StageError> {
        let names = ctx.names();
        let generated = Credentials::generate();

        let secret = credentials_secret(names, &generated)?;
        let creds = match ctx.cluster().create(secret).await {
            Ok(_) => generated,
            // A secret left by an earlier run stays authoritative so the local
            // file keeps matching what the registry checks against.
            Err(ClusterError::AlreadyExists(_)) => {
                debug!("credential secret exists; adopting its contents");
                load_credentials(ctx.cluster().as_ref(), names).await?
            }
            Err(e) => return Err(StageError::create_failed(names.credentials_secret(), e)),
        };

        let yaml = creds
            .to_yaml()
            .map_err(|e| StageError::Render(e.to_string()))?;
        fsutil::write_private(&self.credentials_file, yaml.as_bytes())
            .await
            .map_err(|e| StageError::io(&self.credentials_file, e))?;

        CREDENTIALS_SECRET.set(ctx.store(), SecretRef::new(names.credentials_secret()))?;
        CREDENTIALS_MOUNT.set(ctx.store(), Mount::new(CREDENTIALS_MOUNT_DIR, HTPASSWD_FILE))?;

        info!(
            secret = names.credentials_secret(),
            file = %self.credentials_file.display(),
            "registry credentials ready"
        );
        Ok(())
    }
}

/// Plain `username` / `password` keys for clients, plus the bcrypt
/// [`HTPASSWD_FILE`] entry the registry authenticates against.
fn credentials_secret(names: &RunNames, creds: &Credentials) -> Result<ClusterObject, StageError> {
    let htpasswd = creds
        .htpasswd()
        .map_err(|e| StageError::Render(e.to_string()))?;

    let data = BTreeMap::from([
        (USERNAME_KEY.to_string(), ByteString(creds.username.clone().into_bytes())),
        (PASSWORD_KEY.to_string(), ByteString(creds.password.clone().into_bytes())),
        (HTPASSWD_FILE.to_string(), ByteString(htpasswd.into_bytes())),
    ]);

    Ok(ClusterObject::Secret(Secret {
        metadata: ObjectMeta {
            name: Some(names.credentials_secret().to_string()),
            namespace: Some(names.namespace().to_string()),
            labels: Some(Labels::managed().into_inner()),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(data),
        ..Default::default()
    }))
}

/// Read the credentials stored in the run's credential secret.
pub async fn load_credentials(
    cluster: &dyn ClusterClient,
    names: &RunNames,
) -> Result<Credentials, StageError> {
    let key = ObjectKey::namespaced(
        ObjectKind::Secret,
        names.namespace(),
        names.credentials_secret(),
    );
    let obj = cluster.get(&key).await?;
    let data = obj
        .as_secret()
        .and_then(|s| s.data.as_ref())
        .ok_or_else(|| ClusterError::Invalid(format!("{key} has no data")))?;

    let field = |name: &str| -> Result<String, StageError> {
        let raw = data
            .get(name)
            .ok_or_else(|| ClusterError::Invalid(format!("{key} is missing '{name}'")))?;
        String::from_utf8(raw.0.clone())
            .map_err(|_| ClusterError::Invalid(format!("{key} field '{name}' is not utf-8")).into())
    };

    let creds = Credentials {
        username: field(USERNAME_KEY)?,
        password: field(PASSWORD_KEY)?,
    };
    if creds.username.is_empty() || creds.password.is_empty() {
        return Err(ClusterError::Invalid(format!("{key} holds empty credentials")).into());
    }
    Ok(creds)
}

/// Create a `kubernetes.io/dockerconfigjson` secret in `namespace` so its
/// workloads can pull from the registry.
///
/// The secret carries the pull-secret label teardown selects on. An existing
/// secret is kept.
pub async fn create_pull_secret(
    cluster: &dyn ClusterClient,
    names: &RunNames,
    creds: &Credentials,
    namespace: &str,
) -> Result<ObjectKey, StageError> {
    let host = names.registry_host();
    let auth = STANDARD.encode(format!("{}:{}", creds.username, creds.password));
    let docker_config = json!({
        "auths": {
            host.clone(): {
                "username": creds.username,
                "password": creds.password,
                "auth": auth,
            }
        }
    });
    let payload =
        serde_json::to_vec(&docker_config).map_err(|e| StageError::Render(e.to_string()))?;

    let mut labels = Labels::managed();
    labels.insert(LABEL_PULL_SECRET, "true");

    let secret = ClusterObject::Secret(Secret {
        metadata: ObjectMeta {
            name: Some(PULL_SECRET_NAME.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(labels.into_inner()),
            ..Default::default()
        },
        type_: Some("kubernetes.io/dockerconfigjson".to_string()),
        data: Some(BTreeMap::from([(
            ".dockerconfigjson".to_string(),
            ByteString(payload),
        )])),
        ..Default::default()
    });

    let key = ObjectKey::namespaced(ObjectKind::Secret, namespace, PULL_SECRET_NAME);
    crate::cluster::ensure_created(cluster, secret)
        .await
        .map_err(|e| StageError::create_failed(key.to_string(), e))?;
    info!(secret = %key, registry = %host, "pull secret ready");
    Ok(key)
}
