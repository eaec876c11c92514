//! TLS material for the registry, issued by the certificate controller.
use std::{path::{Path, PathBuf}, sync::Arc};

use async_trait::async_trait;
use ephreg_model::{
    Labels, RunNames, SecretRef, TlsMounts,
    constants::{CA_FILE, CERT_FILE, KEY_FILE},
};
use kube::api::DynamicObject;
use serde_json::json;
use tracing::{info, instrument};

use crate::{
    cluster::{ClusterClient, ClusterError, ClusterObject, ObjectKey, ObjectKind, ensure_created},
    fsutil,
    installer::ControllerInstaller,
    stage::{Stage, StageContext, StageError},
    store::keys::{TLS_MOUNTS, TLS_SECRET},
};

/// Installs the certificate controller and requests a serving certificate.
///
/// Publishes [`TLS_SECRET`] and [`TLS_MOUNTS`] without waiting for the
/// controller to fill the secret: the registry pod cannot start before the
/// secret exists and the readiness deadline covers issuance.
pub struct TlsStage {
    installer: Arc<dyn ControllerInstaller>,
}

impl TlsStage {
    pub fn new(installer: Arc<dyn ControllerInstaller>) -> Self {
        Self { installer }
    }
}

#[async_trait]
impl Stage for TlsStage {
    fn name(&self) -> &'static str {
        "tls"
    }

    #[instrument(level = "debug", skip_all, fields(stage = "tls"))]
    async fn run(&self, ctx: &StageContext) -> Result<(), StageError> {
        let names = ctx.names();

        info!(controller = self.installer.name(), "installing certificate controller");
        self.installer.install(ctx.cancel()).await?;

        let cluster = ctx.cluster().as_ref();
        let issuer = issuer(names)?;
        ensure_created(cluster, issuer)
            .await
            .map_err(|e| StageError::create_failed(names.issuer(), e))?;

        let certificate = certificate(names)?;
        ensure_created(cluster, certificate)
            .await
            .map_err(|e| StageError::create_failed(names.certificate(), e))?;

        TLS_SECRET.set(ctx.store(), SecretRef::new(names.tls_secret()))?;
        TLS_MOUNTS.set(ctx.store(), TlsMounts::default())?;

        info!(secret = names.tls_secret(), host = %names.fqdn(), "certificate requested");
        Ok(())
    }
}

fn issuer(names: &RunNames) -> Result<ClusterObject, StageError> {
    let spec = json!({ "spec": { "selfSigned": {} } });
    Ok(ClusterObject::Issuer(dynamic(ObjectKind::Issuer, names, names.issuer(), spec)?))
}

fn certificate(names: &RunNames) -> Result<ClusterObject, StageError> {
    let fqdn = names.fqdn();
    let spec = json!({
        "spec": {
            "secretName": names.tls_secret(),
            "commonName": fqdn,
            "dnsNames": [fqdn],
            "isCA": false,
            "usages": ["server auth", "digital signature", "key encipherment"],
            "issuerRef": {
                "name": names.issuer(),
                "kind": "Issuer",
                "group": "cert-manager.io",
            },
        }
    });
    Ok(ClusterObject::Certificate(dynamic(
        ObjectKind::Certificate,
        names,
        names.certificate(),
        spec,
    )?))
}

fn dynamic(
    kind: ObjectKind,
    names: &RunNames,
    name: &str,
    data: serde_json::Value,
) -> Result<DynamicObject, StageError> {
    let ar = kind
        .custom_resource()
        .ok_or_else(|| StageError::Render(format!("{kind} is not a custom resource")))?;
    let mut obj = DynamicObject::new(name, &ar)
        .within(names.namespace())
        .data(data);
    obj.metadata.labels = Some(Labels::managed().into_inner());
    Ok(obj)
}

/// Local copies of the issued TLS files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsExport {
    pub ca: PathBuf,
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Copy the issued CA, certificate and key out of the TLS secret into `dir`.
///
/// Only the key is written owner-only. A self-signed secret without `ca.crt`
/// exports the certificate as its own CA.
pub async fn export_tls_material(
    cluster: &dyn ClusterClient,
    names: &RunNames,
    dir: &Path,
) -> Result<TlsExport, StageError> {
    let key = ObjectKey::namespaced(ObjectKind::Secret, names.namespace(), names.tls_secret());
    let obj = cluster.get(&key).await?;
    let data = obj
        .as_secret()
        .and_then(|s| s.data.as_ref())
        .ok_or_else(|| ClusterError::Invalid(format!("{key} has not been issued yet")))?;

    let field = |name: &str| {
        data.get(name)
            .map(|b| b.0.as_slice())
            .ok_or_else(|| ClusterError::Invalid(format!("{key} is missing '{name}'")))
    };
    let cert = field(CERT_FILE)?;
    let private_key = field(KEY_FILE)?;
    let ca = field(CA_FILE).unwrap_or(cert);

    let export = TlsExport {
        ca: dir.join(CA_FILE),
        cert: dir.join(CERT_FILE),
        key: dir.join(KEY_FILE),
    };
    fsutil::write_public(&export.ca, ca)
        .await
        .map_err(|e| StageError::io(&export.ca, e))?;
    fsutil::write_public(&export.cert, cert)
        .await
        .map_err(|e| StageError::io(&export.cert, e))?;
    fsutil::write_private(&export.key, private_key)
        .await
        .map_err(|e| StageError::io(&export.key, e))?;

    info!(dir = %dir.display(), "tls material exported");
    Ok(export)
}
