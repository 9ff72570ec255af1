//! Interruptible delay gate
//!
//! Every wait that pause or stop must be able to cut short goes through a
//! [`DelayGate`]. The gate keeps a single slot: registering a new wait cancels
//! the one already outstanding with [`CancelReason::Overridden`] before the
//! new wait exists, so at most one cancellable wait is pending at any time.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::errors::{CancelReason, Cancelled};

#[derive(Default)]
struct Slot {
    next_id: u64,
    outstanding: Option<Outstanding>,
}

struct Outstanding {
    id: u64,
    cancel: oneshot::Sender<CancelReason>,
}

impl Slot {
    fn cancel_if(&mut self, id: Option<u64>, reason: CancelReason) -> bool {
        let matches = match (&self.outstanding, id) {
            (Some(current), Some(id)) => current.id == id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !matches {
            return false;
        }
        match self.outstanding.take() {
            Some(current) => {
                debug!(wait_id = current.id, reason = %reason, "cancelling outstanding wait");
                current.cancel.send(reason).is_ok()
            }
            None => false,
        }
    }
}

/// Owner of the single outstanding cancellable wait.
#[derive(Clone, Default)]
pub struct DelayGate {
    slot: Arc<Mutex<Slot>>,
}

impl DelayGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a wait of `duration`, cancelling whatever wait was pending.
    ///
    /// The timer starts now, not when the returned [`Delay`] is first polled.
    pub fn wait(&self, duration: Duration) -> Delay {
        let (tx, rx) = oneshot::channel();
        let id = {
            let mut slot = self.slot.lock();
            slot.cancel_if(None, CancelReason::Overridden);
            slot.next_id += 1;
            let id = slot.next_id;
            slot.outstanding = Some(Outstanding { id, cancel: tx });
            id
        };
        debug!(wait_id = id, duration_ms = duration.as_millis() as u64, "wait registered");
        Delay {
            id,
            deadline: Instant::now() + duration,
            cancel_rx: rx,
            slot: Arc::clone(&self.slot),
        }
    }

    /// Cancel the outstanding wait, if any. Returns whether a wait was cancelled.
    pub fn cancel_current(&self, reason: CancelReason) -> bool {
        self.slot.lock().cancel_if(None, reason)
    }

    pub fn has_outstanding(&self) -> bool {
        self.slot.lock().outstanding.is_some()
    }

    /// Convenience for `wait(duration).settle()`.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        self.wait(duration).settle().await
    }
}

/// One registered wait.
pub struct Delay {
    id: u64,
    deadline: Instant,
    cancel_rx: oneshot::Receiver<CancelReason>,
    slot: Arc<Mutex<Slot>>,
}

impl Delay {
    /// Handle that cancels exactly this wait.
    pub fn canceller(&self) -> DelayCanceller {
        DelayCanceller {
            id: self.id,
            slot: Arc::clone(&self.slot),
        }
    }

    /// Resolve on natural timeout, or fail with [`Cancelled`] carrying the reason.
    pub async fn settle(mut self) -> Result<(), Cancelled> {
        tokio::select! {
            biased;
            Ok(reason) = &mut self.cancel_rx => Err(Cancelled::new(reason)),
            _ = sleep_until(self.deadline) => Ok(()),
        }
    }
}

impl Drop for Delay {
    fn drop(&mut self) {
        let mut slot = self.slot.lock();
        if slot
            .outstanding
            .as_ref()
            .map(|current| current.id == self.id)
            .unwrap_or(false)
        {
            slot.outstanding = None;
        }
    }
}

/// Cancels one specific wait; a no-op once that wait settled or was cancelled.
#[derive(Clone)]
pub struct DelayCanceller {
    id: u64,
    slot: Arc<Mutex<Slot>>,
}

impl DelayCanceller {
    pub fn cancel(&self, reason: CancelReason) -> bool {
        self.slot.lock().cancel_if(Some(self.id), reason)
    }
}
