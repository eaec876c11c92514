use clap::Args;

use ephreg_core::{
    cluster::{ClusterObject, ensure_created},
    stage::credentials::{create_pull_secret, load_credentials},
};

use super::RunContext;

#[derive(Args, Debug)]
pub struct PullSecretArgs {
    /// Namespace whose workloads pull from the registry.
    #[arg(short, long)]
    pub namespace: String,
}

/// `ephreg pull-secret -n <namespace>`: copy the registry credentials into a
/// docker-config secret there. Teardown removes it by label.
pub async fn run(ctx: &RunContext, args: PullSecretArgs) -> anyhow::Result<()> {
    let cluster = ctx.cluster().await?;
    let creds = load_credentials(cluster.as_ref(), &ctx.names).await?;

    ensure_created(cluster.as_ref(), ClusterObject::namespace(&args.namespace)).await?;
    let key = create_pull_secret(cluster.as_ref(), &ctx.names, &creds, &args.namespace).await?;
    println!("{key}");
    Ok(())
}
