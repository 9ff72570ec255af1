//! Clip duration resolution.
//!
//! A clip's playing time is read from its audio metadata and padded with a
//! buffer. Anything that goes wrong (unparseable resource, probe error, probe
//! that never answers, non-finite or zero duration) yields the fallback
//! duration instead of an error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autoplay_core_types::PageError;
use tracing::{debug, warn};
use url::Url;

use crate::types::PlaybackTimings;

/// Reads audio metadata for a resource.
#[async_trait]
pub trait AudioProbe: Send + Sync {
    /// Duration in seconds as reported by the media metadata, if any.
    async fn probe_duration(&self, resource: &Url) -> Result<Option<f64>, PageError>;
}

/// A trigger control's declared audio resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeclaredResource {
    /// Site-relative path such as `/media/a.mp3`.
    Path(String),
    /// Absolute http(s) URL.
    Absolute(Url),
}

impl DeclaredResource {
    /// Parse the raw attribute value.
    ///
    /// Accepts a JSON array whose first element is the path (optionally
    /// HTML-escaped with `&quot;`), a bare site-relative path, or an absolute
    /// URL.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if trimmed.starts_with('[') {
            let unescaped = trimmed.replace("&quot;", "\"");
            let parsed: Vec<serde_json::Value> = serde_json::from_str(&unescaped).ok()?;
            let first = parsed.first()?.as_str()?;
            return Self::parse_plain(first);
        }

        Self::parse_plain(trimmed)
    }

    fn parse_plain(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.starts_with('/') {
            return Some(DeclaredResource::Path(value.to_string()));
        }
        match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                Some(DeclaredResource::Absolute(url))
            }
            _ => None,
        }
    }

    /// Absolute URL of the resource relative to the document at `base`.
    pub fn resolve(&self, base: &Url) -> Option<Url> {
        match self {
            DeclaredResource::Path(path) => base.join(path).ok(),
            DeclaredResource::Absolute(url) => Some(url.clone()),
        }
    }
}

/// Round a metadata duration up to whole milliseconds and add the buffer.
///
/// Returns `None` for values that cannot be a real clip length.
pub fn padded_duration(seconds: f64, buffer: Duration) -> Option<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return None;
    }
    let millis = (seconds * 1000.0).ceil() as u64;
    Some(Duration::from_millis(millis) + buffer)
}

/// Turns a trigger's declared resource into the time to wait for it.
#[derive(Clone)]
pub struct DurationResolver {
    probe: Arc<dyn AudioProbe>,
    timings: PlaybackTimings,
}

impl DurationResolver {
    pub fn new(probe: Arc<dyn AudioProbe>, timings: PlaybackTimings) -> Self {
        Self { probe, timings }
    }

    /// Always returns a duration; failures fall back to the configured default.
    pub async fn resolve(&self, declared: Option<&str>, base: &Url) -> Duration {
        let fallback = self.timings.fallback();

        let Some(raw) = declared else {
            debug!("trigger has no declared resource, using fallback");
            return fallback;
        };

        let Some(resource) = DeclaredResource::parse(raw).and_then(|r| r.resolve(base)) else {
            warn!(raw, "unrecognised audio resource, using fallback");
            return fallback;
        };

        let probed = tokio::time::timeout(
            self.timings.metadata_timeout(),
            self.probe.probe_duration(&resource),
        )
        .await;

        match probed {
            Ok(Ok(Some(seconds))) => match padded_duration(seconds, self.timings.buffer()) {
                Some(duration) => {
                    debug!(
                        resource = %resource,
                        seconds,
                        wait_ms = duration.as_millis() as u64,
                        "clip duration resolved"
                    );
                    duration
                }
                None => {
                    warn!(resource = %resource, seconds, "invalid clip duration, using fallback");
                    fallback
                }
            },
            Ok(Ok(None)) => {
                warn!(resource = %resource, "no duration in metadata, using fallback");
                fallback
            }
            Ok(Err(err)) => {
                warn!(resource = %resource, error = %err, "metadata probe failed, using fallback");
                fallback
            }
            Err(_) => {
                warn!(resource = %resource, "metadata probe timed out, using fallback");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct FixedProbe {
        answer: Result<Option<f64>, PageError>,
        seen: Mutex<Vec<Url>>,
    }

    impl FixedProbe {
        fn new(answer: Result<Option<f64>, PageError>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AudioProbe for FixedProbe {
        async fn probe_duration(&self, resource: &Url) -> Result<Option<f64>, PageError> {
            self.seen.lock().push(resource.clone());
            self.answer.clone()
        }
    }

    struct HangingProbe;

    #[async_trait]
    impl AudioProbe for HangingProbe {
        async fn probe_duration(&self, _resource: &Url) -> Result<Option<f64>, PageError> {
            std::future::pending().await
        }
    }

    fn base() -> Url {
        Url::parse("https://dict.example.org/und-hani/su/12").unwrap()
    }

    #[test]
    fn parses_escaped_json_array() {
        let parsed = DeclaredResource::parse("[&quot;/media/a.mp3&quot;, &quot;/media/b.mp3&quot;]");
        assert_eq!(parsed, Some(DeclaredResource::Path("/media/a.mp3".into())));
        assert_eq!(
            parsed.unwrap().resolve(&base()).unwrap().as_str(),
            "https://dict.example.org/media/a.mp3"
        );
    }

    #[test]
    fn rejects_unusable_values() {
        assert_eq!(DeclaredResource::parse(""), None);
        assert_eq!(DeclaredResource::parse("[]"), None);
        assert_eq!(DeclaredResource::parse("[1]"), None);
        assert_eq!(DeclaredResource::parse("media/a.mp3"), None);
        assert_eq!(DeclaredResource::parse("javascript:alert(1)"), None);
    }

    #[test]
    fn padding_rounds_up() {
        assert_eq!(
            padded_duration(1.2341, Duration::from_millis(500)),
            Some(Duration::from_millis(1735))
        );
        assert_eq!(padded_duration(0.0, Duration::ZERO), None);
        assert_eq!(padded_duration(f64::NAN, Duration::ZERO), None);
        assert_eq!(padded_duration(f64::INFINITY, Duration::ZERO), None);
    }

    #[tokio::test]
    async fn probed_duration_is_padded() {
        let probe = FixedProbe::new(Ok(Some(2.0)));
        let resolver = DurationResolver::new(probe.clone(), PlaybackTimings::default());
        let wait = resolver.resolve(Some("/media/x.mp3"), &base()).await;
        assert_eq!(wait, Duration::from_millis(2500));
        assert_eq!(
            probe.seen.lock()[0].as_str(),
            "https://dict.example.org/media/x.mp3"
        );
    }

    #[tokio::test]
    async fn probe_failures_use_fallback() {
        let timings = PlaybackTimings::default();
        for answer in [
            Ok(None),
            Ok(Some(-1.0)),
            Err(PageError::Script("decode error".into())),
        ] {
            let resolver = DurationResolver::new(FixedProbe::new(answer), timings.clone());
            assert_eq!(
                resolver.resolve(Some("/media/x.mp3"), &base()).await,
                timings.fallback()
            );
        }
        let resolver = DurationResolver::new(FixedProbe::new(Ok(Some(1.0))), timings.clone());
        assert_eq!(resolver.resolve(None, &base()).await, timings.fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_probe_times_out_to_fallback() {
        let timings = PlaybackTimings::default();
        let resolver = DurationResolver::new(Arc::new(HangingProbe), timings.clone());
        let started = tokio::time::Instant::now();
        let wait = resolver.resolve(Some("/media/slow.mp3"), &base()).await;
        assert_eq!(wait, timings.fallback());
        assert!(started.elapsed() <= timings.metadata_timeout() + Duration::from_millis(1));
    }
}
