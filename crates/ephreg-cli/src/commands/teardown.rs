use tokio_util::sync::CancellationToken;
use tracing::info;

use ephreg_core::{cluster::ClusterHandle, teardown::TeardownSequencer};

use super::{RunContext, report_failures};

/// `ephreg teardown`. Only a missing cluster client is fatal; every other
/// failure is printed and the command still succeeds.
pub async fn run(ctx: &RunContext) -> anyhow::Result<()> {
    let cluster = ctx.cluster().await?;
    let failures = cleanup(ctx, Some(cluster)).await;
    report_failures("teardown left work behind", &failures);
    Ok(())
}

/// Remove the run's cluster objects, local artifacts, hosts entry and
/// finally the cluster itself. Without a client only the local and
/// cluster-tool steps run.
pub(crate) async fn cleanup(ctx: &RunContext, cluster: Option<ClusterHandle>) -> Vec<String> {
    // Independent of the run token: an interrupted setup still cleans up.
    let cancel = CancellationToken::new();
    let mut failures = Vec::new();

    if let Some(cluster) = cluster {
        let mut sequencer = TeardownSequencer::new(cluster, ctx.names.clone())
            .with_installer(ctx.installer())
            .with_artifact(ctx.config.credentials_file())
            .with_artifact(ctx.config.tls_export_dir())
            .with_artifact(ctx.config.engine_config_dir())
            .with_metrics(ctx.metrics());
        if let Some(dir) = ctx.config.engine_ca_dir(&ctx.names) {
            sequencer = sequencer.with_artifact(dir);
        }
        let report = sequencer.run().await;
        info!(
            removed = report.removed().len(),
            clean = report.is_clean(),
            "cluster teardown finished"
        );
        failures.extend(report.failures().iter().map(ToString::to_string));
    }

    if let Err(e) = ctx.hosts().remove(&ctx.names.fqdn()).await {
        failures.push(format!("hosts ({}): {e}", ctx.config.hosts_file.display()));
    }

    let kubeconfig = ctx.config.kubeconfig_path();
    if let Err(e) = ctx
        .cluster_tool()
        .delete(&ctx.config.cluster_name, &kubeconfig, &cancel)
        .await
    {
        failures.push(format!("cluster ({}): {e}", ctx.config.cluster_name));
    }

    failures
}
