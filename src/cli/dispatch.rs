use super::compose::cmd_compose_url;
use super::demo::cmd_demo;
use super::env::CliArgs;
use super::run::cmd_run;
use crate::cli::commands::Commands;
use anyhow::Result;
use sutian_autoplay::Config;

pub async fn dispatch(cli: &CliArgs, config: &Config) -> Result<()> {
    match cli.command.clone() {
        Commands::Run(args) => cmd_run(args, config).await,
        Commands::Demo(args) => cmd_demo(args, config).await,
        Commands::ComposeUrl(args) => cmd_compose_url(args, config),
    }
}
