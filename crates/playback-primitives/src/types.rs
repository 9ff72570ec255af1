use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing knobs for the players and the sequencer, in milliseconds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackTimings {
    /// Used when a clip's duration cannot be determined.
    pub fallback_ms: u64,
    /// Added to every probed duration.
    pub buffer_ms: u64,
    /// Upper bound on a metadata probe.
    pub metadata_timeout_ms: u64,
    pub between_clips_ms: u64,
    pub between_items_ms: u64,
    pub scroll_settle_ms: u64,
    pub highlight_settle_ms: u64,
    /// Pause after the embedded document loads before touching its controls.
    pub host_settle_ms: u64,
    /// Pause between closing one host and opening the next.
    pub host_reopen_ms: u64,
    /// Dwell time on an entry whose document has no audio controls.
    pub empty_host_grace_ms: u64,
    /// Delay before navigating to the next result page.
    pub pagination_grace_ms: u64,
}

impl Default for PlaybackTimings {
    fn default() -> Self {
        Self {
            fallback_ms: 3000,
            buffer_ms: 500,
            metadata_timeout_ms: 5000,
            between_clips_ms: 200,
            between_items_ms: 200,
            scroll_settle_ms: 300,
            highlight_settle_ms: 200,
            host_settle_ms: 150,
            host_reopen_ms: 50,
            empty_host_grace_ms: 1000,
            pagination_grace_ms: 1500,
        }
    }
}

impl PlaybackTimings {
    pub fn fallback(&self) -> Duration {
        Duration::from_millis(self.fallback_ms)
    }

    pub fn buffer(&self) -> Duration {
        Duration::from_millis(self.buffer_ms)
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_millis(self.metadata_timeout_ms)
    }

    pub fn between_clips(&self) -> Duration {
        Duration::from_millis(self.between_clips_ms)
    }

    pub fn between_items(&self) -> Duration {
        Duration::from_millis(self.between_items_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn highlight_settle(&self) -> Duration {
        Duration::from_millis(self.highlight_settle_ms)
    }

    pub fn host_settle(&self) -> Duration {
        Duration::from_millis(self.host_settle_ms)
    }

    pub fn host_reopen(&self) -> Duration {
        Duration::from_millis(self.host_reopen_ms)
    }

    pub fn empty_host_grace(&self) -> Duration {
        Duration::from_millis(self.empty_host_grace_ms)
    }

    pub fn pagination_grace(&self) -> Duration {
        Duration::from_millis(self.pagination_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let timings: PlaybackTimings =
            serde_json::from_str(r#"{"fallback_ms": 1200, "buffer_ms": 0}"#).unwrap();
        assert_eq!(timings.fallback(), Duration::from_millis(1200));
        assert_eq!(timings.buffer(), Duration::ZERO);
        assert_eq!(timings.metadata_timeout(), Duration::from_secs(5));
        assert_eq!(timings.between_clips(), Duration::from_millis(200));
    }
}
