use clap::Subcommand;

use super::compose::ComposeUrlArgs;
use super::demo::DemoArgs;
use super::run::RunArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Open a result page in Chromium and play it with the on-page controls
    Run(RunArgs),

    /// Play a simulated result page, driven from the terminal
    Demo(DemoArgs),

    /// Print the URL a pagination handoff would navigate to
    ComposeUrl(ComposeUrlArgs),
}
