//! Sequencer - owner of run state and the per-item protocol
//!
//! Lifecycle: `Idle -> Running <-> Paused -> Stopping -> Idle`, with
//! `Running -> Completed` at the natural end of the queue, which hands off to
//! the pagination bridge before returning to `Idle`.
//!
//! Control requests (`start`, `pause`, `resume`, `stop`) are serialised
//! through one transition lock. The run loop itself is a spawned task that
//! only reads the phase; stop aborts it outright.

use std::sync::Arc;

use autoplay_core_types::{
    ElementRef, HostPage, ItemOutcome, PageShape, Phase, PlaybackItem, RunId, StatusLine,
};
use autoplay_event_bus::{InMemoryBus, RunEvent};
use parking_lot::Mutex;
use playback_primitives::{AudioProbe, CancelReason, DurationResolver, PlaybackTimings};
use target_locator::{HighlightManager, TargetLocator, Treatment};
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::control::{Gate, RunControl};
use crate::errors::FlowError;
use crate::pagination::{PaginationBridge, PaginationConfig};
use crate::player::{EmbeddedDocumentPlayer, InlinePlayer, PauseSource, PlayOutcome, PlayerSet};
use crate::queue::{build_queue, queue_offset_for_raw};

const EVENT_CAPACITY: usize = 256;

/// Consecutive interrupted attempts at one item, while running, before it is given up.
const MAX_ITEM_RETRIES: u32 = 3;

pub const COMPLETION_NOTICE: &str = "All entries on this page have been played.";

#[derive(Clone, Debug, Default)]
pub struct SequencerConfig {
    pub timings: PlaybackTimings,
    pub pagination: PaginationConfig,
    /// Leave the modal host open when pausing from the control panel.
    pub keep_host_on_pause: bool,
}

/// What a start request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { total: usize },
    Resumed,
    AlreadyRunning,
}

/// Point-in-time view of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    pub run_id: Option<RunId>,
    pub phase: Phase,
    pub shape: Option<PageShape>,
    pub queue: Vec<PlaybackItem>,
    pub cursor: usize,
}

impl RunSnapshot {
    pub fn current(&self) -> Option<&PlaybackItem> {
        self.queue.get(self.cursor)
    }
}

#[derive(Default)]
struct RunState {
    run_id: Option<RunId>,
    shape: Option<PageShape>,
    queue: Vec<PlaybackItem>,
    cursor: usize,
}

struct Inner {
    page: Arc<dyn HostPage>,
    control: Arc<RunControl>,
    locator: TargetLocator,
    highlights: AsyncMutex<HighlightManager>,
    players: PlayerSet,
    bridge: PaginationBridge,
    bus: Arc<InMemoryBus<RunEvent>>,
    timings: PlaybackTimings,
    state: Mutex<RunState>,
    task: Mutex<Option<JoinHandle<()>>>,
    transitions: AsyncMutex<()>,
}

/// Handle to the playback state machine. Clones share one run.
#[derive(Clone)]
pub struct Sequencer {
    inner: Arc<Inner>,
}

impl Sequencer {
    pub fn new(page: Arc<dyn HostPage>, probe: Arc<dyn AudioProbe>, config: SequencerConfig) -> Self {
        let control = Arc::new(RunControl::new());
        let durations = DurationResolver::new(probe, config.timings.clone());
        let players = PlayerSet::new(
            Arc::new(EmbeddedDocumentPlayer::new(
                page.clone(),
                control.clone(),
                durations.clone(),
                config.timings.clone(),
                config.keep_host_on_pause,
            )),
            Arc::new(InlinePlayer::new(page.clone(), control.clone(), durations)),
        );
        Self::with_players(page, control, players, config)
    }

    /// Build a sequencer around caller-supplied players sharing `control`.
    pub fn with_players(
        page: Arc<dyn HostPage>,
        control: Arc<RunControl>,
        players: PlayerSet,
        config: SequencerConfig,
    ) -> Self {
        let inner = Inner {
            locator: TargetLocator::new(page.clone()),
            highlights: AsyncMutex::new(HighlightManager::new(page.clone())),
            bridge: PaginationBridge::new(page.clone(), config.pagination),
            bus: InMemoryBus::new(EVENT_CAPACITY),
            timings: config.timings,
            state: Mutex::new(RunState::default()),
            task: Mutex::new(None),
            transitions: AsyncMutex::new(()),
            page,
            control,
            players,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn phase(&self) -> Phase {
        self.inner.control.phase()
    }

    pub fn control(&self) -> &Arc<RunControl> {
        &self.inner.control
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunEvent> {
        use autoplay_event_bus::EventBus;
        self.inner.bus.subscribe()
    }

    pub fn bus(&self) -> Arc<InMemoryBus<RunEvent>> {
        self.inner.bus.clone()
    }

    pub fn snapshot(&self) -> RunSnapshot {
        let state = self.inner.state.lock();
        RunSnapshot {
            run_id: state.run_id.clone(),
            phase: self.inner.control.phase(),
            shape: state.shape,
            queue: state.queue.clone(),
            cursor: state.cursor,
        }
    }

    /// Elements currently carrying the active or paused treatment.
    pub async fn highlighted(&self) -> Vec<ElementRef> {
        self.inner.highlights.lock().await.remembered().to_vec()
    }

    /// Start a run from raw row `from_raw`, or resume a paused one.
    ///
    /// 1. Idle: scan, filter to playable items, map the raw row to a queue offset
    /// 2. Seed queue and cursor, enter `Running`, spawn the run loop
    ///
    /// Discovery failures publish a notice and leave the phase untouched.
    pub async fn start(&self, from_raw: usize) -> Result<StartOutcome, FlowError> {
        let _guard = self.inner.transitions.lock().await;

        match self.inner.control.phase() {
            Phase::Idle => {}
            Phase::Paused => {
                self.inner.resume_locked().await;
                return Ok(StartOutcome::Resumed);
            }
            phase => {
                debug!(?phase, "start ignored, run in progress");
                return Ok(StartOutcome::AlreadyRunning);
            }
        }

        let scan = match self.inner.page.scan().await {
            Ok(scan) => scan,
            Err(err) => {
                return Err(self
                    .inner
                    .refuse(FlowError::Discovery(format!("page scan failed: {err}"))))
            }
        };
        let mut queue = build_queue(&scan).map_err(|err| self.inner.refuse(err))?;
        let offset = queue_offset_for_raw(&queue, from_raw).ok_or_else(|| {
            self.inner
                .refuse(FlowError::StartOutOfRange { index: from_raw })
        })?;
        queue.drain(..offset);

        let total = queue.len();
        let run_id = RunId::new();
        {
            let mut state = self.inner.state.lock();
            *state = RunState {
                run_id: Some(run_id.clone()),
                shape: Some(scan.shape),
                queue,
                cursor: 0,
            };
        }

        self.inner.control.set_phase(Phase::Running);
        info!(
            run_id = %run_id,
            shape = ?scan.shape,
            from_raw,
            offset,
            total,
            "run started"
        );
        self.inner.bus.emit(RunEvent::PhaseChanged(Phase::Running));
        self.inner.bus.emit(RunEvent::Status(StatusLine::Running {
            position: 0,
            total,
        }));

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run_loop(run_id).await });
        *self.inner.task.lock() = Some(handle);

        Ok(StartOutcome::Started { total })
    }

    /// Paused to Running; reapplies the active treatment to the remembered set.
    pub async fn resume(&self) -> bool {
        let _guard = self.inner.transitions.lock().await;
        if self.inner.control.phase() != Phase::Paused {
            debug!("resume ignored, not paused");
            return false;
        }
        self.inner.resume_locked().await;
        true
    }

    /// Running to Paused. The cursor stays on the current item.
    pub async fn pause(&self, source: PauseSource) -> bool {
        let _guard = self.inner.transitions.lock().await;
        if self.inner.control.phase() != Phase::Running {
            debug!(?source, "pause ignored, not running");
            return false;
        }

        self.inner.control.set_phase(Phase::Paused);
        let cancelled = self
            .inner
            .control
            .delays()
            .cancel_current(source.cancel_reason());
        info!(?source, cancelled_wait = cancelled, "run paused");

        if let Err(err) = self.inner.highlights.lock().await.apply_paused().await {
            warn!(error = %err, "paused treatment not applied");
        }

        let shape = self.inner.state.lock().shape;
        if let Some(shape) = shape {
            if let Err(err) = self.inner.players.for_shape(shape).suspend(source).await {
                warn!(error = %err, "player suspend failed");
            }
        }

        self.inner.bus.emit(RunEvent::PhaseChanged(Phase::Paused));
        self.inner.publish_progress();
        true
    }

    /// Pause when running, resume when paused.
    pub async fn toggle_pause(&self) -> bool {
        match self.phase() {
            Phase::Running => self.pause(PauseSource::Button).await,
            Phase::Paused => self.resume().await,
            _ => false,
        }
    }

    /// Discard the run from any non-idle phase. Idle is a no-op.
    pub async fn stop(&self) -> bool {
        let _guard = self.inner.transitions.lock().await;
        let phase = self.inner.control.phase();
        if phase == Phase::Idle {
            debug!("stop ignored, nothing running");
            return false;
        }

        self.inner.control.set_phase(Phase::Stopping);
        self.inner.bus.emit(RunEvent::PhaseChanged(Phase::Stopping));
        self.inner.control.delays().cancel_current(CancelReason::Stopped);

        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            if let Err(err) = handle.await {
                if err.is_panic() {
                    error!(error = %err, "run loop panicked");
                }
            }
        }

        self.inner.teardown().await;
        info!(from = ?phase, "run stopped");
        true
    }

    /// Wait for the spawned run loop to finish.
    pub async fn join(&self) {
        let handle = self.inner.task.lock().take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    error!(error = %err, "run loop panicked");
                }
            }
        }
    }

    pub async fn wait_until_idle(&self) {
        self.inner.control.wait_for_phase(Phase::Idle).await;
    }
}

impl Inner {
    /// Surface a blocking error to the user and hand it back.
    fn refuse(&self, err: FlowError) -> FlowError {
        warn!(error = %err, "start refused");
        self.bus.emit(RunEvent::Notice(err.to_string()));
        err
    }

    async fn resume_locked(&self) {
        self.control.set_phase(Phase::Running);
        if let Err(err) = self.highlights.lock().await.resume_active().await {
            warn!(error = %err, "active treatment not restored");
        }
        info!("run resumed");
        self.bus.emit(RunEvent::PhaseChanged(Phase::Running));
        self.publish_progress();
    }

    fn publish_progress(&self) {
        let (position, total) = {
            let state = self.state.lock();
            (state.cursor, state.queue.len())
        };
        if total == 0 {
            return;
        }
        let status = match self.control.phase() {
            Phase::Running => StatusLine::Running { position, total },
            Phase::Paused => StatusLine::Paused { position, total },
            _ => return,
        };
        self.bus.emit(RunEvent::Status(status));
    }

    fn current_item(&self) -> Option<(usize, usize, PageShape, PlaybackItem)> {
        let state = self.state.lock();
        let shape = state.shape?;
        let item = state.queue.get(state.cursor)?.clone();
        Some((state.cursor, state.queue.len(), shape, item))
    }

    /// Move past the current item. Returns whether another item follows.
    fn advance(&self) -> bool {
        let mut state = self.state.lock();
        state.cursor += 1;
        state.cursor < state.queue.len()
    }

    async fn run_loop(self: Arc<Self>, run_id: RunId) {
        let mut retries = 0u32;

        loop {
            if self.control.wait_while_paused().await == Gate::Halted {
                debug!(run_id = %run_id, "run loop halted");
                return;
            }

            let Some((position, total, shape, item)) = self.current_item() else {
                break;
            };

            self.publish_progress();
            self.bus.emit(RunEvent::ItemStarted {
                position,
                total,
                original_index: item.original_index,
            });

            let outcome = match self.process_item(shape, &item).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(
                        run_id = %run_id,
                        position,
                        row = item.original_index,
                        error = %err,
                        "item failed, moving on"
                    );
                    ItemOutcome::Failed(err.to_string())
                }
            };
            debug!(position, ?outcome, "item finished");
            self.bus.emit(RunEvent::ItemFinished {
                position,
                original_index: item.original_index,
                outcome: outcome.clone(),
            });

            match self.control.phase() {
                Phase::Running => {}
                Phase::Paused => continue,
                _ => return,
            }

            if outcome == ItemOutcome::Interrupted {
                retries += 1;
                if retries < MAX_ITEM_RETRIES {
                    continue;
                }
                warn!(position, "item kept getting interrupted, giving up on it");
            }
            retries = 0;

            if let Err(err) = self.players.release_all().await {
                debug!(error = %err, "player release failed");
            }
            if !self.advance() {
                break;
            }
            if outcome == ItemOutcome::Skipped {
                continue;
            }
            // A pause here lands on the next item; the gate above holds it.
            let _ = self.control.wait(self.timings.between_items()).await;
        }

        self.finish(run_id).await;
    }

    /// Locate, scroll, highlight, then play one item.
    async fn process_item(
        &self,
        shape: PageShape,
        item: &PlaybackItem,
    ) -> Result<ItemOutcome, FlowError> {
        let located = self.locator.locate(shape, &item.key).await;
        if located.is_empty() {
            info!(row = item.original_index, key = %item.key, "entry not on page, skipping");
            if let Err(err) = self.highlights.lock().await.clear_all().await {
                debug!(error = %err, "clearing previous highlight failed");
            }
            return Ok(ItemOutcome::Skipped);
        }

        if let Some(target) = located.scroll_target() {
            if let Err(err) = self.page.scroll_into_view(target).await {
                debug!(error = %err, "scroll to entry failed");
            }
        }
        sleep(self.timings.scroll_settle()).await;

        {
            let mut highlights = self.highlights.lock().await;
            let treatment = match self.control.phase() {
                Phase::Running => Treatment::Active,
                Phase::Paused => Treatment::Paused,
                _ => return Ok(ItemOutcome::Interrupted),
            };
            if let Err(err) = highlights
                .apply(&located.targets.elements(), treatment)
                .await
            {
                warn!(error = %err, "entry highlight incomplete");
            }
        }
        sleep(self.timings.highlight_settle()).await;
        if !self.control.is_running() {
            return Ok(ItemOutcome::Interrupted);
        }

        match self.players.for_shape(shape).play(item).await? {
            PlayOutcome::Completed => Ok(ItemOutcome::Played),
            PlayOutcome::Interrupted => Ok(ItemOutcome::Interrupted),
        }
    }

    /// End of queue: mark completion, then hand off to the next page or go idle.
    async fn finish(&self, run_id: RunId) {
        {
            let _guard = self.transitions.lock().await;
            if self.control.phase() != Phase::Running {
                return;
            }
            self.control.set_phase(Phase::Completed);
            self.bus.emit(RunEvent::PhaseChanged(Phase::Completed));
            info!(run_id = %run_id, "queue finished");
        }

        let destination = self.bridge.next_destination().await;

        if let Ok(Some(_)) = &destination {
            // Leave the last highlight visible for a moment; stop cancels this.
            if self
                .control
                .delays()
                .sleep(self.timings.pagination_grace())
                .await
                .is_err()
            {
                return;
            }
        }

        let _guard = self.transitions.lock().await;
        if self.control.phase() != Phase::Completed {
            return;
        }
        self.teardown().await;

        match destination {
            Ok(Some(url)) => {
                info!(run_id = %run_id, url = %url, "continuing on next page");
                self.bus.emit(RunEvent::Navigating {
                    url: url.to_string(),
                });
                if let Err(err) = self.page.navigate(&url).await {
                    error!(url = %url, error = %err, "navigation to next page failed");
                    self.bus
                        .emit(RunEvent::Notice(format!("Could not open the next page: {err}")));
                }
            }
            Ok(None) => {
                info!(run_id = %run_id, "last page reached");
                self.bus.emit(RunEvent::Notice(COMPLETION_NOTICE.to_string()));
            }
            Err(err) => {
                error!(run_id = %run_id, error = %err, "next page url could not be built");
                self.bus.emit(RunEvent::Notice(err.to_string()));
            }
        }
    }

    /// Drop all run state: cancel the wait, close hosts, clear highlights, go idle.
    async fn teardown(&self) {
        self.control.delays().cancel_current(CancelReason::Stopped);
        if let Err(err) = self.players.release_all().await {
            warn!(error = %err, "player release failed during teardown");
        }
        if let Err(err) = self.highlights.lock().await.clear_all().await {
            warn!(error = %err, "highlights not fully cleared");
        }
        *self.state.lock() = RunState::default();
        self.control.set_phase(Phase::Idle);
        self.bus.emit(RunEvent::PhaseChanged(Phase::Idle));
        self.bus.emit(RunEvent::Status(StatusLine::Cleared));
    }
}
