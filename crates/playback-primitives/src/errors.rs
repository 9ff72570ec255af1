//! Error types for playback primitives

use std::fmt;

use thiserror::Error;

/// Why an outstanding wait was cut short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// A newer wait replaced this one.
    Overridden,
    /// Pause requested from the control panel.
    Paused,
    /// Pause requested by clicking the host backdrop.
    PausedOverlay,
    /// The run was stopped.
    Stopped,
    /// The modal host went away underneath the wait.
    HostClosed,
}

impl CancelReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelReason::Overridden => "overridden",
            CancelReason::Paused => "paused",
            CancelReason::PausedOverlay => "paused_overlay",
            CancelReason::Stopped => "stopped",
            CancelReason::HostClosed => "host_closed",
        }
    }
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal returned by a wait that was cancelled.
///
/// This is not a fault: it tells the caller to stop what it was doing.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("wait cancelled: {reason}")]
pub struct Cancelled {
    pub reason: CancelReason,
}

impl Cancelled {
    pub fn new(reason: CancelReason) -> Self {
        Self { reason }
    }
}
