use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

use autoplay_core_types::{ItemOutcome, Phase, StatusLine};

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// Everything the sequencer reports to the control surface.
#[derive(Clone, Debug, PartialEq)]
pub enum RunEvent {
    PhaseChanged(Phase),
    Status(StatusLine),
    /// Blocking, user-facing message.
    Notice(String),
    ItemStarted {
        position: usize,
        total: usize,
        original_index: usize,
    },
    ItemFinished {
        position: usize,
        original_index: usize,
        outcome: ItemOutcome,
    },
    /// The run is handing off to the next result page.
    Navigating { url: String },
}

/// In-memory broadcast bus.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }

    /// Fire-and-forget publish; an empty audience is not an error here.
    pub fn emit(&self, event: E) {
        if self.sender.send(event).is_err() {
            trace!("event dropped, no subscribers");
        }
    }
}

impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}
