//! Application configuration
//!
//! One YAML document; every section falls back to its defaults when absent.

use std::time::Duration;

use cdp_adapter::{CdpConfig, PageSelectors};
use playback_flow::{PaginationConfig, SequencerConfig};
use playback_primitives::PlaybackTimings;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: CdpConfig,
    pub selectors: PageSelectors,
    pub timings: PlaybackTimings,
    pub pagination: PaginationConfig,
    pub playback: PlaybackOptions,
}

/// Behaviour of the control surface around the sequencer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackOptions {
    /// Leave the modal host open when pausing from the control panel.
    pub keep_host_on_pause: bool,
    /// How often on-page clicks are collected.
    pub poll_interval_ms: u64,
    /// Gap between stopping a paused run and restarting it from another row.
    pub restart_delay_ms: u64,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            keep_host_on_pause: false,
            poll_interval_ms: 250,
            restart_delay_ms: 100,
        }
    }
}

impl PlaybackOptions {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

impl Config {
    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            timings: self.timings.clone(),
            pagination: self.pagination.clone(),
            keep_host_on_pause: self.playback.keep_host_on_pause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_section_defaults() {
        let yaml = r#"
timings:
  fallback_ms: 4000
pagination:
  cursor_params: [iahbe, page]
playback:
  keep_host_on_pause: true
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.timings.fallback_ms, 4000);
        assert_eq!(config.timings.buffer_ms, PlaybackTimings::default().buffer_ms);
        assert_eq!(config.pagination.cursor_params, vec!["iahbe", "page"]);
        assert_eq!(config.pagination.marker, "autoplay");
        assert!(config.playback.keep_host_on_pause);
        assert_eq!(config.playback.poll_interval_ms, 250);
        assert_eq!(config.selectors, PageSelectors::default());

        let seq = config.sequencer_config();
        assert!(seq.keep_host_on_pause);
        assert_eq!(seq.timings.fallback_ms, 4000);
    }
}
