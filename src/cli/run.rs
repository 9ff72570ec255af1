use std::sync::Arc;

use anyhow::{Context, Result};
use autoplay_core_types::ControlCommand;
use cdp_adapter::{ChromiumPage, ChromiumSession};
use clap::Args;
use playback_flow::Sequencer;
use sutian_autoplay::{Config, ControlSurface, PumpExit};
use tracing::{info, warn};
use url::Url;

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Result page to open
    #[arg(long)]
    pub url: String,

    /// Run Chromium without a window (audio is muted)
    #[arg(long)]
    pub headless: bool,

    /// Start playing right away from this raw row
    #[arg(long)]
    pub from: Option<usize>,
}

pub async fn cmd_run(args: RunArgs, config: &Config) -> Result<()> {
    let url = Url::parse(&args.url).context("--url is not a valid URL")?;
    let mut browser = config.browser.clone();
    browser.headless |= args.headless;

    let session = ChromiumSession::launch(&browser)
        .await
        .context("failed to launch chromium")?;
    let page = session
        .open(&url, config.selectors.clone())
        .await
        .context("failed to open the result page")?;

    let result = drive(&page, config, args.from).await;
    if let Err(err) = session.close().await {
        warn!(error = %err, "browser did not close cleanly");
    }
    result
}

/// One control surface per page load; pagination hands off to the next load.
async fn drive(page: &Arc<ChromiumPage>, config: &Config, mut from: Option<usize>) -> Result<()> {
    loop {
        let sequencer = Sequencer::new(page.clone(), page.clone(), config.sequencer_config());
        let surface = ControlSurface::new(
            sequencer,
            page.clone(),
            page.clone(),
            config.pagination.marker.clone(),
            config.playback.restart_delay(),
        );
        let forwarder = surface.spawn_forwarder();

        if let Err(err) = surface.install().await {
            warn!(error = %err, "control panel could not be installed");
        }
        let resumed = match surface.on_page_load().await {
            Ok(resumed) => resumed,
            Err(err) => {
                warn!(error = %err, "resume after page load failed");
                false
            }
        };
        if let Some(row) = from.take().filter(|_| !resumed) {
            if let Err(err) = surface.dispatch(ControlCommand::StartFromRow(row)).await {
                warn!(row, error = %err, "initial start failed");
            }
        }

        info!("controls ready, press Ctrl-C to quit");
        let exit = surface
            .pump(config.playback.poll_interval(), async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!(error = %err, "ctrl-c handler unavailable");
                    std::future::pending::<()>().await;
                }
            })
            .await;

        match exit {
            PumpExit::Shutdown => {
                surface.sequencer().stop().await;
                forwarder.abort();
                return Ok(());
            }
            PumpExit::Navigated(next) => {
                info!(url = %next, "following pagination");
                surface.sequencer().join().await;
                forwarder.abort();
            }
        }
    }
}
