//! Run control: the phase channel and the shared delay gate

use std::time::Duration;

use autoplay_core_types::Phase;
use playback_primitives::{CancelReason, Cancelled, DelayGate};
use tokio::sync::watch;
use tracing::debug;

/// Result of waiting out a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Running again.
    Proceed,
    /// The run is ending; drop the current work.
    Halted,
}

/// Phase and wait bookkeeping shared by the sequencer and the players.
///
/// Only the sequencer writes the phase; players observe it.
pub struct RunControl {
    phase: watch::Sender<Phase>,
    delays: DelayGate,
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

impl RunControl {
    pub fn new() -> Self {
        let (phase, _) = watch::channel(Phase::Idle);
        Self {
            phase,
            delays: DelayGate::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub(crate) fn set_phase(&self, next: Phase) -> Phase {
        let previous = self.phase.send_replace(next);
        if previous != next {
            debug!(?previous, ?next, "phase changed");
        }
        previous
    }

    pub fn is_running(&self) -> bool {
        self.phase() == Phase::Running
    }

    pub fn delays(&self) -> &DelayGate {
        &self.delays
    }

    pub fn watch(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Block while paused. Returns once running again or the run is ending.
    pub async fn wait_while_paused(&self) -> Gate {
        let mut rx = self.phase.subscribe();
        let settled = rx.wait_for(|phase| *phase != Phase::Paused).await.map(|p| *p);
        match settled {
            Ok(Phase::Running) => Gate::Proceed,
            _ => Gate::Halted,
        }
    }

    pub async fn wait_for_phase(&self, target: Phase) {
        let mut rx = self.phase.subscribe();
        let _ = rx.wait_for(|phase| *phase == target).await;
    }

    /// Interruptible wait that refuses to start unless the run is live.
    ///
    /// The wait is registered before the phase is read, so a pause that lands
    /// in between either cancels it or is seen here.
    pub async fn wait(&self, duration: Duration) -> Result<(), Cancelled> {
        let delay = self.delays.wait(duration);
        match self.phase() {
            Phase::Running => delay.settle().await,
            Phase::Paused => Err(Cancelled::new(CancelReason::Paused)),
            _ => Err(Cancelled::new(CancelReason::Stopped)),
        }
    }
}
