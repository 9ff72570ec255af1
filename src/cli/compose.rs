use anyhow::{Context, Result};
use clap::Args;
use playback_flow::compose_next_url;
use sutian_autoplay::Config;
use url::Url;

#[derive(Args, Clone, Debug)]
pub struct ComposeUrlArgs {
    /// URL of the result page currently shown
    #[arg(long)]
    pub current: String,

    /// Href of the page's "next" link, relative or absolute
    #[arg(long)]
    pub next: String,
}

pub fn cmd_compose_url(args: ComposeUrlArgs, config: &Config) -> Result<()> {
    let current = Url::parse(&args.current).context("--current is not a valid URL")?;
    let next = compose_next_url(
        &current,
        &args.next,
        &config.pagination.cursor_params,
        &config.pagination.marker,
    )
    .context("could not compose the next page URL")?;
    println!("{next}");
    Ok(())
}
