use std::{
    net::{IpAddr, Ipv4Addr},
    path::Path,
};

use anyhow::Context;
use tracing::info;

use ephreg_core::{cluster::ClusterHandle, pipeline::SetupPipeline, stage::tls::export_tls_material};

use super::{RunContext, report_failures, teardown};

/// `ephreg setup`. On failure the error is printed, everything created so
/// far is torn down, and the command fails.
pub async fn run(ctx: &RunContext) -> anyhow::Result<()> {
    let mut cluster = None;
    match provision(ctx, &mut cluster).await {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("setup failed: {err:#}");
            let failures = teardown::cleanup(ctx, cluster).await;
            report_failures("teardown after failed setup left work behind", &failures);
            Err(err.context("setup failed"))
        }
    }
}

/// Leaves the client in `cluster` as soon as it exists so the caller can
/// tear down with it.
async fn provision(ctx: &RunContext, cluster: &mut Option<ClusterHandle>) -> anyhow::Result<()> {
    let cfg = &ctx.config;
    let kubeconfig = cfg.kubeconfig_path();

    ctx.cluster_tool()
        .create(
            &cfg.cluster_name,
            &kubeconfig,
            cfg.cluster_ready_timeout(),
            &ctx.cancel,
        )
        .await
        .context("creating cluster")?;

    let handle = cluster.insert(ctx.cluster().await?).clone();

    let pipeline = SetupPipeline::from_config(cfg, handle.clone(), ctx.installer())?
        .with_metrics(ctx.metrics());
    pipeline
        .provision(cfg.readiness_timeout(), &ctx.cancel)
        .await?;

    let export = export_tls_material(handle.as_ref(), &ctx.names, &cfg.tls_export_dir())
        .await
        .context("exporting TLS material")?;
    if let Some(dir) = cfg.engine_ca_dir(&ctx.names) {
        trust_ca(&export.ca, &dir).await?;
    }
    ctx.hosts()
        .add(IpAddr::V4(Ipv4Addr::LOCALHOST), &ctx.names.fqdn())
        .await?;

    info!(registry = %ctx.names.registry_host(), ca = %export.ca.display(), "registry ready");
    println!("{}", ctx.names.registry_host());
    Ok(())
}

/// Copy the registry CA to `<dir>/ca.crt` so the container engine accepts the
/// self-signed certificate.
async fn trust_ca(ca: &Path, dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating {}", dir.display()))?;
    let target = dir.join("ca.crt");
    tokio::fs::copy(ca, &target)
        .await
        .with_context(|| format!("installing registry CA at {}", target.display()))?;
    info!(path = %target.display(), "registry CA trusted by container engine");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ca_lands_in_engine_host_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ca = dir.path().join("exported-ca.crt");
        std::fs::write(&ca, "CA PEM").unwrap();
        let host_dir = dir.path().join("certs.d/registry.reg.svc.cluster.local:5000");

        trust_ca(&ca, &host_dir).await.unwrap();
        // Rerun overwrites in place.
        trust_ca(&ca, &host_dir).await.unwrap();

        assert_eq!(std::fs::read_to_string(host_dir.join("ca.crt")).unwrap(), "CA PEM");
    }

    #[tokio::test]
    async fn missing_ca_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = trust_ca(&dir.path().join("absent"), &dir.path().join("d"))
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("installing registry CA"));
    }
}
