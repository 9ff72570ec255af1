use std::sync::Arc;

use anyhow::{Context, Result};
use autoplay_core_types::{ControlCommand, PageShape};
use autoplay_event_bus::RunEvent;
use clap::Args;
use playback_flow::sim::{SimEvent, SimulatedPage};
use playback_flow::Sequencer;
use sutian_autoplay::{Config, ControlSurface, PumpExit};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};
use url::Url;

const DEMO_PAGE: &str = "https://sutian.example.org/und-hani/tshiau?lui=tai_su&iahbe=1";

#[derive(Args, Clone, Debug)]
pub struct DemoArgs {
    /// Entries on each simulated page
    #[arg(long, default_value_t = 5)]
    pub entries: usize,

    /// Make every Nth entry silent (0 keeps them all audible)
    #[arg(long, default_value_t = 0)]
    pub silent: usize,

    /// Simulate a single-column list page instead of a table
    #[arg(long)]
    pub list: bool,

    /// Number of result pages to chain through pagination
    #[arg(long, default_value_t = 1)]
    pub pages: usize,

    /// Clip length in seconds
    #[arg(long, default_value_t = 1.0)]
    pub seconds: f64,
}

/// Terminal key to command: `p` pause/resume, `s` stop, `g [n]` start, `b` backdrop click.
fn parse_command(line: &str) -> Option<ControlCommand> {
    let mut parts = line.split_whitespace();
    match parts.next()? {
        "p" => Some(ControlCommand::TogglePause),
        "s" => Some(ControlCommand::Stop),
        "b" => Some(ControlCommand::BackdropClicked),
        "g" => match parts.next() {
            Some(row) => row.parse().ok().map(ControlCommand::StartFromRow),
            None => Some(ControlCommand::Start),
        },
        _ => None,
    }
}

pub async fn cmd_demo(args: DemoArgs, config: &Config) -> Result<()> {
    let shape = if args.list {
        PageShape::List
    } else {
        PageShape::Table
    };
    let mut url = Url::parse(DEMO_PAGE).context("demo page url")?;
    let (quit_tx, quit_rx) = watch::channel(false);
    let (keys_tx, _) = broadcast::channel::<ControlCommand>(32);
    spawn_stdin(keys_tx.clone(), quit_tx);

    println!("keys: g [row] start, p pause/resume, s stop, b backdrop click, q quit");
    for number in 1..=args.pages.max(1) {
        let mut page = SimulatedPage::demo(shape, url.clone(), args.entries, args.silent, args.seconds);
        if number < args.pages {
            page = page.with_next_page(format!("/und-hani/tshiau?lui=tai_su&iahbe={}", number + 1));
        }
        let page = Arc::new(page);

        let sequencer = Sequencer::new(page.clone(), page.clone(), config.sequencer_config());
        let surface = ControlSurface::new(
            sequencer,
            page.clone(),
            page.clone(),
            config.pagination.marker.clone(),
            config.playback.restart_delay(),
        );
        let forwarder = surface.spawn_forwarder();
        let reporter = spawn_reporter(&surface, &page);
        let relay = spawn_relay(keys_tx.subscribe(), page.clone());

        surface.install().await?;
        if !surface.on_page_load().await? {
            info!(page = number, "waiting for `g` to start");
        }

        let mut quit = quit_rx.clone();
        let exit = surface
            .pump(config.playback.poll_interval(), async move {
                if quit.wait_for(|quit| *quit).await.is_err() {
                    std::future::pending::<()>().await;
                }
            })
            .await;
        relay.abort();
        reporter.abort();

        match exit {
            PumpExit::Shutdown => {
                surface.sequencer().stop().await;
                forwarder.abort();
                return Ok(());
            }
            PumpExit::Navigated(next) => {
                surface.sequencer().join().await;
                forwarder.abort();
                url = Url::parse(&next).context("navigation target")?;
                println!("-- page {} -> {}", number + 1, url);
            }
        }
    }
    Ok(())
}

fn spawn_stdin(keys: broadcast::Sender<ControlCommand>, quit: watch::Sender<bool>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim() == "q" => break,
                Ok(Some(line)) => match parse_command(&line) {
                    Some(command) => {
                        let _ = keys.send(command);
                    }
                    None => println!("unknown key: {}", line.trim()),
                },
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "stdin closed");
                    break;
                }
            }
        }
        let _ = quit.send(true);
    });
}

/// Feed terminal keys into the page as if the on-page buttons were clicked.
fn spawn_relay(
    mut keys: broadcast::Receiver<ControlCommand>,
    page: Arc<SimulatedPage>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match keys.recv().await {
                Ok(command) => page.push_command(command),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn spawn_reporter(
    surface: &ControlSurface,
    page: &Arc<SimulatedPage>,
) -> tokio::task::JoinHandle<()> {
    let mut runs = surface.sequencer().subscribe();
    let mut sims = page.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                event = runs.recv() => match event {
                    Ok(RunEvent::ItemStarted { position, total, original_index }) => {
                        println!("[{}/{}] row {}", position + 1, total, original_index);
                    }
                    Ok(RunEvent::ItemFinished { original_index, outcome, .. }) => {
                        println!("      row {} -> {:?}", original_index, outcome);
                    }
                    Ok(RunEvent::PhaseChanged(phase)) => println!("phase: {:?}", phase),
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                event = sims.recv() => match event {
                    Ok(SimEvent::Activated { resource, .. }) => {
                        println!("      playing {}", resource.unwrap_or_default());
                    }
                    Ok(SimEvent::Notice(message)) => println!("notice: {message}"),
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    })
}
