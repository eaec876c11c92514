use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    commands::{self, RunContext, pull_secret::PullSecretArgs, push::PushArgs},
    config::CliConfig,
};

/// Ephemeral TLS registry inside a throwaway cluster.
#[derive(Parser, Debug)]
#[command(name = "ephreg")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Provisioning config (YAML). Built-in defaults apply when omitted.
    #[arg(short, long, global = true, env = "EPHREG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Write stage and teardown metrics in prometheus text format on exit.
    #[arg(long, global = true, value_name = "FILE")]
    pub metrics_out: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the cluster and provision the registry.
    Setup,
    /// Remove everything setup created.
    Teardown,
    /// Tag a local image with the current revision and push it.
    Push(PushArgs),
    /// Create a pull secret for the registry in another namespace.
    PullSecret(PullSecretArgs),
    /// Print the build version.
    Version,
}

impl Cli {
    pub async fn run(self, config: CliConfig) -> anyhow::Result<()> {
        let cancel = CancellationToken::new();
        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupted; cancelling");
                    cancel.cancel();
                }
            }
        });

        let ctx = RunContext::new(config.provision, self.metrics_out.is_some(), cancel)?;
        let result = match self.command {
            Commands::Setup => commands::setup::run(&ctx).await,
            Commands::Teardown => commands::teardown::run(&ctx).await,
            Commands::Push(args) => commands::push::run(&ctx, args).await,
            Commands::PullSecret(args) => commands::pull_secret::run(&ctx, args).await,
            Commands::Version => {
                println!("ephreg {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        };

        if let Some(path) = &self.metrics_out {
            ctx.write_metrics(path).await?;
        }
        result
    }
}
