//! Item players
//!
//! Two strategies behind [`ItemPlayer`]: table pages open each entry in a
//! modal host and play every clip inside it, list pages activate the entry's
//! own trigger once.

use std::sync::Arc;

use async_trait::async_trait;
use autoplay_core_types::{
    HostLoad, HostPage, LocatorKey, PageShape, PlaybackItem, TriggerHandle, VisualState,
};
use parking_lot::Mutex;
use playback_primitives::{CancelReason, DurationResolver, PlaybackTimings};
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::control::{Gate, RunControl};
use crate::errors::FlowError;

/// How `play` ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Every clip was played (or the entry turned out to have none).
    Completed,
    /// A pause or stop cut playback short.
    Interrupted,
}

/// Where a pause request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseSource {
    /// The pause button on the control panel.
    Button,
    /// A click on the dimmed backdrop around the modal host.
    Backdrop,
}

impl PauseSource {
    pub fn cancel_reason(&self) -> CancelReason {
        match self {
            PauseSource::Button => CancelReason::Paused,
            PauseSource::Backdrop => CancelReason::PausedOverlay,
        }
    }
}

#[async_trait]
pub trait ItemPlayer: Send + Sync {
    /// Play one item, returning when its audio is done or playback was interrupted.
    async fn play(&self, item: &PlaybackItem) -> Result<PlayOutcome, FlowError>;

    /// React to a pause.
    async fn suspend(&self, source: PauseSource) -> Result<(), FlowError>;

    /// Drop any per-item resources.
    async fn release(&self) -> Result<(), FlowError>;
}

/// Plays an entry inside a modal host showing the entry's own page.
pub struct EmbeddedDocumentPlayer {
    page: Arc<dyn HostPage>,
    control: Arc<RunControl>,
    durations: DurationResolver,
    timings: PlaybackTimings,
    keep_host_on_pause: bool,
    /// URL this player last loaded into the host.
    host: Mutex<Option<Url>>,
}

impl EmbeddedDocumentPlayer {
    pub fn new(
        page: Arc<dyn HostPage>,
        control: Arc<RunControl>,
        durations: DurationResolver,
        timings: PlaybackTimings,
        keep_host_on_pause: bool,
    ) -> Self {
        Self {
            page,
            control,
            durations,
            timings,
            keep_host_on_pause,
            host: Mutex::new(None),
        }
    }

    /// Whether the live host still shows `url`.
    async fn host_shows(&self, url: &Url) -> bool {
        match self.page.host_url().await {
            Ok(Some(live)) => &live == url,
            Ok(None) => false,
            Err(err) => {
                debug!(error = %err, "host url unavailable");
                false
            }
        }
    }

    async fn can_reuse_host(&self, url: &Url) -> bool {
        let remembered = self.host.lock().clone();
        remembered.as_ref() == Some(url) && self.host_shows(url).await
    }

    async fn close_host(&self) -> Result<(), FlowError> {
        self.host.lock().take();
        self.page.close_host().await?;
        Ok(())
    }

    /// Make the host show `url`. Returns `None` when the item should end here.
    async fn ensure_host(&self, url: &Url) -> Result<Option<PlayOutcome>, FlowError> {
        if self.can_reuse_host(url).await {
            debug!(url = %url, "reusing open host");
            return Ok(None);
        }

        self.close_host().await?;
        sleep(self.timings.host_reopen()).await;
        if !self.control.is_running() {
            return Ok(Some(PlayOutcome::Interrupted));
        }

        match self.page.open_host(url).await? {
            HostLoad::Loaded => {
                *self.host.lock() = Some(url.clone());
                debug!(url = %url, "host loaded");
            }
            HostLoad::Failed(reason) => {
                warn!(url = %url, %reason, "entry page failed to load, skipping");
                self.close_host().await?;
                return Ok(Some(PlayOutcome::Completed));
            }
        }

        sleep(self.timings.host_settle()).await;
        Ok(None)
    }

    async fn play_clip(
        &self,
        url: &Url,
        base: &Url,
        trigger: &TriggerHandle,
        index: usize,
    ) -> Result<Option<PlayOutcome>, FlowError> {
        if self.control.wait_while_paused().await == Gate::Halted {
            return Ok(Some(PlayOutcome::Interrupted));
        }
        if !self.host_shows(url).await {
            debug!(url = %url, clip = index, "host went away during pause");
            return Ok(Some(PlayOutcome::Interrupted));
        }

        let wait = self
            .durations
            .resolve(trigger.declared_resource.as_deref(), base)
            .await;

        if let Err(err) = self.page.scroll_into_view(&trigger.element).await {
            warn!(clip = index, error = %err, "clip control vanished, skipping clip");
            return Ok(None);
        }
        sleep(self.timings.scroll_settle()).await;
        if !self.control.is_running() {
            return Ok(Some(PlayOutcome::Interrupted));
        }

        if let Err(err) = self
            .page
            .set_visual(&trigger.element, VisualState::NowPlaying)
            .await
        {
            debug!(clip = index, error = %err, "now-playing marker not applied");
        }
        if let Err(err) = self.page.activate(trigger).await {
            warn!(clip = index, error = %err, "clip activation failed");
        }
        info!(clip = index, wait_ms = wait.as_millis() as u64, "clip playing");

        let played = self.control.wait(wait).await;

        if let Err(err) = self
            .page
            .set_visual(&trigger.element, VisualState::Neutral)
            .await
        {
            debug!(clip = index, error = %err, "now-playing marker not cleared");
        }

        if let Err(cancelled) = played {
            debug!(clip = index, reason = %cancelled.reason, "clip wait cancelled");
            return Ok(Some(PlayOutcome::Interrupted));
        }
        Ok(None)
    }
}

#[async_trait]
impl ItemPlayer for EmbeddedDocumentPlayer {
    async fn play(&self, item: &PlaybackItem) -> Result<PlayOutcome, FlowError> {
        let LocatorKey::Url(url) = &item.key else {
            return Err(FlowError::Internal(
                "embedded playback needs an entry url".into(),
            ));
        };

        if let Some(outcome) = self.ensure_host(url).await? {
            return Ok(outcome);
        }

        let triggers = self.page.host_triggers().await?;
        if triggers.is_empty() {
            info!(url = %url, "entry has no audio controls");
            return match self.control.wait(self.timings.empty_host_grace()).await {
                Ok(()) => Ok(PlayOutcome::Completed),
                Err(_) => Ok(PlayOutcome::Interrupted),
            };
        }

        let base = match self.page.host_url().await {
            Ok(Some(live)) => live,
            _ => url.clone(),
        };

        let count = triggers.len();
        for (index, trigger) in triggers.iter().enumerate() {
            if let Some(outcome) = self.play_clip(url, &base, trigger, index).await? {
                return Ok(outcome);
            }
            if index + 1 < count && self.control.wait(self.timings.between_clips()).await.is_err()
            {
                return Ok(PlayOutcome::Interrupted);
            }
        }

        Ok(PlayOutcome::Completed)
    }

    async fn suspend(&self, source: PauseSource) -> Result<(), FlowError> {
        if source == PauseSource::Button && self.keep_host_on_pause {
            debug!("keeping host open across pause");
            return Ok(());
        }
        self.close_host().await
    }

    async fn release(&self) -> Result<(), FlowError> {
        self.close_host().await
    }
}

/// Plays an entry whose trigger sits directly on the page.
pub struct InlinePlayer {
    page: Arc<dyn HostPage>,
    control: Arc<RunControl>,
    durations: DurationResolver,
}

impl InlinePlayer {
    pub fn new(
        page: Arc<dyn HostPage>,
        control: Arc<RunControl>,
        durations: DurationResolver,
    ) -> Self {
        Self {
            page,
            control,
            durations,
        }
    }
}

#[async_trait]
impl ItemPlayer for InlinePlayer {
    async fn play(&self, item: &PlaybackItem) -> Result<PlayOutcome, FlowError> {
        let Some(trigger) = &item.trigger else {
            warn!(row = item.original_index, "inline item has no trigger");
            return Ok(PlayOutcome::Completed);
        };

        let base = self.page.current_url().await?;
        let wait = self
            .durations
            .resolve(trigger.declared_resource.as_deref(), &base)
            .await;
        if !self.control.is_running() {
            return Ok(PlayOutcome::Interrupted);
        }

        self.page.activate(trigger).await?;
        info!(
            row = item.original_index,
            wait_ms = wait.as_millis() as u64,
            "inline clip playing"
        );

        match self.control.wait(wait).await {
            Ok(()) => Ok(PlayOutcome::Completed),
            Err(cancelled) => {
                debug!(reason = %cancelled.reason, "inline wait cancelled");
                Ok(PlayOutcome::Interrupted)
            }
        }
    }

    async fn suspend(&self, _source: PauseSource) -> Result<(), FlowError> {
        Ok(())
    }

    async fn release(&self) -> Result<(), FlowError> {
        Ok(())
    }
}

/// One player per page shape.
#[derive(Clone)]
pub struct PlayerSet {
    embedded: Arc<dyn ItemPlayer>,
    inline: Arc<dyn ItemPlayer>,
}

impl PlayerSet {
    pub fn new(embedded: Arc<dyn ItemPlayer>, inline: Arc<dyn ItemPlayer>) -> Self {
        Self { embedded, inline }
    }

    pub fn for_shape(&self, shape: PageShape) -> &Arc<dyn ItemPlayer> {
        match shape {
            PageShape::Table => &self.embedded,
            PageShape::List => &self.inline,
        }
    }

    /// Release both players, reporting the first failure.
    pub async fn release_all(&self) -> Result<(), FlowError> {
        let embedded = self.embedded.release().await;
        let inline = self.inline.release().await;
        embedded.and(inline)
    }
}
