use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::{init_logging, load_config, LoadedConfig};

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;

    info!(
        "Starting sutian-autoplay v{} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let LoadedConfig { config, path } = load_config(cli.config.as_ref()).await?;
    info!(config = %path.display(), "configuration ready");

    match dispatch(&cli, &config).await {
        Ok(()) => {
            info!("Command completed successfully");
            Ok(())
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            Err(err)
        }
    }
}
