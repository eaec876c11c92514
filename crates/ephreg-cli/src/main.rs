use clap::Parser;

use ephreg_observe::{init_local_offset, init_logger};

mod cli;
mod commands;
mod config;

use cli::Cli;
use config::CliConfig;

fn main() -> anyhow::Result<()> {
    // Offset detection only works while the process is single-threaded.
    init_local_offset();

    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.as_deref())?;
    init_logger(&config.logger.clone().with_env()?)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli.run(config))
}
