use anyhow::Context;
use clap::Args;
use tracing::info;

use ephreg_core::stage::credentials::load_credentials;
use ephreg_exec::{
    PortForward,
    tools::{ContainerEngine, VersionControl},
};

use super::RunContext;

#[derive(Args, Debug)]
pub struct PushArgs {
    /// Local image to push, e.g. `app:dev`.
    pub image: String,

    /// Tag to push under; defaults to the repository's HEAD revision.
    #[arg(long)]
    pub tag: Option<String>,
}

/// `ephreg push <image>`: retag the image as `<registry>/<name>:<tag>` and push
/// it through a port-forward to the registry service.
pub async fn run(ctx: &RunContext, args: PushArgs) -> anyhow::Result<()> {
    let cfg = &ctx.config;
    let tag = match args.tag {
        Some(tag) => tag,
        None => VersionControl::new(&cfg.tools.git)
            .head_revision(&ctx.cancel)
            .await
            .context("resolving image tag")?,
    };

    let cluster = ctx.cluster().await?;
    let creds = load_credentials(cluster.as_ref(), &ctx.names).await?;

    let registry = format!("{}:{}", ctx.names.fqdn(), cfg.local_port);
    let target = target_reference(&registry, &args.image, &tag);

    let mut forward = PortForward::kubectl(
        &cfg.tools.kubectl,
        &cfg.kubeconfig_path(),
        ctx.names.namespace(),
        ctx.names.service(),
        cfg.local_port,
    );
    forward.start(&ctx.cancel).await?;

    let engine = ContainerEngine::new(&cfg.tools.engine).with_config_dir(cfg.engine_config_dir());
    let pushed = async {
        engine.login(&registry, &creds, &ctx.cancel).await?;
        engine.tag(&args.image, &target, &ctx.cancel).await?;
        engine.push(&target, &ctx.cancel).await
    }
    .await;
    forward.stop().await;

    pushed?;
    info!(image = %args.image, target = %target, "image pushed");
    println!("{target}");
    Ok(())
}

/// `<registry>/<repository>:<tag>`, dropping the source registry, tag and
/// digest `image` already carries. A `:` before the last `/` belongs to a
/// registry port, not a tag.
fn target_reference(registry: &str, image: &str, tag: &str) -> String {
    let without_digest = image.split('@').next().unwrap_or(image);
    let name_start = without_digest.rfind('/').map_or(0, |i| i + 1);
    let repository = match without_digest[name_start..].find(':') {
        Some(i) => &without_digest[..name_start + i],
        None => without_digest,
    };
    let repository = match repository.split_once('/') {
        Some((host, rest)) if host.contains(['.', ':']) || host == "localhost" => rest,
        _ => repository,
    };
    format!("{registry}/{repository}:{tag}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const REG: &str = "registry.ci.svc.cluster.local:5000";

    #[test]
    fn replaces_existing_tag() {
        assert_eq!(
            target_reference(REG, "app:dev", "abc123"),
            format!("{REG}/app:abc123")
        );
    }

    #[test]
    fn replaces_source_registry() {
        assert_eq!(
            target_reference(REG, "localhost:5001/team/app:1.0", "abc"),
            format!("{REG}/team/app:abc")
        );
        assert_eq!(
            target_reference(REG, "ghcr.io/org/app", "abc"),
            format!("{REG}/org/app:abc")
        );
    }

    #[test]
    fn drops_digest() {
        assert_eq!(
            target_reference(REG, "app@sha256:deadbeef", "v1"),
            format!("{REG}/app:v1")
        );
    }

    #[test]
    fn untagged_image() {
        assert_eq!(target_reference(REG, "team/app", "v1"), format!("{REG}/team/app:v1"));
    }
}
