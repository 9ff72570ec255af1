//! Control surface
//!
//! Translates user intents (on-page clicks, terminal keys) into sequencer
//! calls and mirrors sequencer events back onto the page's control panel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use autoplay_core_types::{ControlCommand, ControlPanel, ControlsView, HostPage, Phase, StatusLine};
use autoplay_event_bus::RunEvent;
use playback_flow::{FlowError, PauseSource, ResumeMarker, Sequencer, StartOutcome};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Shown when a row start button is used while a run is playing.
pub const ALREADY_PLAYING_NOTICE: &str =
    "Playback is in progress. Stop it or wait for it to finish before starting from a specific row.";

/// Why [`ControlSurface::pump`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PumpExit {
    Shutdown,
    /// The run handed off to another result page.
    Navigated(String),
}

pub struct ControlSurface {
    sequencer: Sequencer,
    page: Arc<dyn HostPage>,
    panel: Arc<dyn ControlPanel>,
    marker: String,
    restart_delay: Duration,
}

impl ControlSurface {
    pub fn new(
        sequencer: Sequencer,
        page: Arc<dyn HostPage>,
        panel: Arc<dyn ControlPanel>,
        marker: impl Into<String>,
        restart_delay: Duration,
    ) -> Self {
        Self {
            sequencer,
            page,
            panel,
            marker: marker.into(),
            restart_delay,
        }
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    /// Put the panel on the page in its idle state.
    pub async fn install(&self) -> Result<(), FlowError> {
        self.panel.install_controls().await?;
        self.panel
            .render_controls(ControlsView::from(self.sequencer.phase()), StatusLine::Cleared)
            .await?;
        Ok(())
    }

    pub async fn dispatch(&self, command: ControlCommand) -> Result<(), FlowError> {
        debug!(?command, phase = ?self.sequencer.phase(), "control command");
        match command {
            ControlCommand::Start => self.start(0).await,
            ControlCommand::StartFromRow(row) => self.start_from_row(row).await,
            ControlCommand::TogglePause => {
                self.sequencer.toggle_pause().await;
                Ok(())
            }
            ControlCommand::Pause => {
                self.sequencer.pause(PauseSource::Button).await;
                Ok(())
            }
            ControlCommand::Resume => {
                self.sequencer.resume().await;
                Ok(())
            }
            ControlCommand::Stop => {
                self.sequencer.stop().await;
                Ok(())
            }
            ControlCommand::BackdropClicked => {
                self.sequencer.pause(PauseSource::Backdrop).await;
                Ok(())
            }
        }
    }

    async fn start(&self, row: usize) -> Result<(), FlowError> {
        match self.sequencer.start(row).await? {
            StartOutcome::Started { total } => info!(row, total, "playback started"),
            StartOutcome::Resumed => info!("playback resumed"),
            StartOutcome::AlreadyRunning => debug!("start ignored, already running"),
        }
        Ok(())
    }

    async fn start_from_row(&self, row: usize) -> Result<(), FlowError> {
        match self.sequencer.phase() {
            Phase::Running => {
                info!(row, "row start refused while playing");
                self.panel.show_notice(ALREADY_PLAYING_NOTICE).await?;
                Ok(())
            }
            Phase::Paused => {
                info!(row, "restarting paused run from row");
                self.sequencer.stop().await;
                sleep(self.restart_delay).await;
                self.start(row).await
            }
            Phase::Idle => self.start(row).await,
            phase => {
                debug!(row, ?phase, "row start ignored during transition");
                Ok(())
            }
        }
    }

    /// Consume the resume marker left by a pagination handoff.
    ///
    /// Returns `true` when the marker was present and playback was started.
    pub async fn on_page_load(&self) -> Result<bool, FlowError> {
        let url = self.page.current_url().await?;
        let Some(stripped) = ResumeMarker::take(&url, &self.marker) else {
            return Ok(false);
        };
        info!(url = %stripped, "resume marker found, continuing playback");
        if let Err(err) = self.page.replace_url(&stripped).await {
            warn!(error = %err, "could not strip resume marker from the address bar");
        }
        self.start(0).await?;
        Ok(true)
    }

    /// Mirror phase, progress and notices onto the panel until the bus closes.
    pub fn spawn_forwarder(&self) -> JoinHandle<()> {
        let mut events = self.sequencer.subscribe();
        let panel = Arc::clone(&self.panel);
        let mut view = ControlsView::from(self.sequencer.phase());
        let mut status = StatusLine::Cleared;
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "panel forwarder lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let result = match event {
                    RunEvent::PhaseChanged(phase) => {
                        view = ControlsView::from(phase);
                        if view == ControlsView::Idle {
                            status = StatusLine::Cleared;
                        }
                        panel.render_controls(view, status).await
                    }
                    RunEvent::Status(line) => {
                        status = line;
                        panel.render_controls(view, status).await
                    }
                    RunEvent::Notice(message) => panel.show_notice(&message).await,
                    _ => Ok(()),
                };
                if let Err(err) = result {
                    debug!(error = %err, "panel update failed");
                }
            }
        })
    }

    /// Collect on-page commands every `every` and dispatch them.
    ///
    /// Returns when `shutdown` resolves or the run navigates away.
    pub async fn pump<F>(&self, every: Duration, shutdown: F) -> PumpExit
    where
        F: Future<Output = ()>,
    {
        let mut events = self.sequencer.subscribe();
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => return PumpExit::Shutdown,
                event = events.recv() => match event {
                    Ok(RunEvent::Navigating { url }) => return PumpExit::Navigated(url),
                    Ok(_) | Err(RecvError::Lagged(_)) => {}
                    Err(RecvError::Closed) => return PumpExit::Shutdown,
                },
                _ = ticker.tick() => self.poll_panel().await,
            }
        }
    }

    async fn poll_panel(&self) {
        if let Err(err) = self.panel.install_controls().await {
            debug!(error = %err, "control panel not reinstalled");
        }
        let commands = match self.panel.drain_commands().await {
            Ok(commands) => commands,
            Err(err) => {
                debug!(error = %err, "could not collect control commands");
                return;
            }
        };
        for command in commands {
            if let Err(err) = self.dispatch(command).await {
                warn!(?command, error = %err, "control command failed");
            }
        }
    }
}
