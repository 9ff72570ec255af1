//! Pagination handoff and the resume marker

use std::sync::Arc;

use autoplay_core_types::HostPage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::errors::{FlowError, PaginationError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Query keys that encode the result page; only these are copied from the next-page link.
    pub cursor_params: Vec<String>,
    /// Boolean query flag that asks the next page load to start playing.
    pub marker: String,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            cursor_params: vec!["iahbe".to_string()],
            marker: "autoplay".to_string(),
        }
    }
}

/// Overlay the pagination parameters of `href` onto `current` and add the resume marker.
///
/// Keys already in the current query are replaced in place, missing ones are
/// appended, every other parameter is kept. A stale marker is dropped before
/// the fresh one is appended.
pub fn compose_next_url(
    current: &Url,
    href: &str,
    cursor_params: &[String],
    marker: &str,
) -> Result<Url, PaginationError> {
    let next = current
        .join(href)
        .map_err(|err| PaginationError::InvalidHref {
            href: href.to_string(),
            reason: err.to_string(),
        })?;

    let overlay: Vec<(String, String)> = next
        .query_pairs()
        .filter(|(key, _)| cursor_params.iter().any(|param| param == key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if overlay.is_empty() {
        return Err(PaginationError::NoCursor(href.to_string()));
    }

    let mut pairs: Vec<(String, String)> = current
        .query_pairs()
        .filter(|(key, _)| key != marker)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    for (key, value) in overlay {
        let mut seen = false;
        pairs.retain_mut(|(existing, current_value)| {
            if *existing != key {
                return true;
            }
            if seen {
                return false;
            }
            seen = true;
            *current_value = value.clone();
            true
        });
        if !seen {
            pairs.push((key, value));
        }
    }

    let mut composed = current.clone();
    {
        let mut query = composed.query_pairs_mut();
        query.clear();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
        query.append_pair(marker, "true");
    }
    Ok(composed)
}

/// Resume marker on a freshly loaded page.
pub struct ResumeMarker;

impl ResumeMarker {
    /// If `url` carries the marker set to `true` or `1`, return it with the marker removed.
    pub fn take(url: &Url, marker: &str) -> Option<Url> {
        let mut found = false;
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, value)| {
                if key == marker {
                    found |= value == "true" || value == "1";
                    false
                } else {
                    true
                }
            })
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        if !found {
            return None;
        }

        let mut stripped = url.clone();
        if kept.is_empty() {
            stripped.set_query(None);
        } else {
            let mut query = stripped.query_pairs_mut();
            query.clear();
            for (key, value) in &kept {
                query.append_pair(key, value);
            }
        }
        Some(stripped)
    }
}

/// Finds where a finished run should continue.
#[derive(Clone)]
pub struct PaginationBridge {
    page: Arc<dyn HostPage>,
    config: PaginationConfig,
}

impl PaginationBridge {
    pub fn new(page: Arc<dyn HostPage>, config: PaginationConfig) -> Self {
        Self { page, config }
    }

    pub fn config(&self) -> &PaginationConfig {
        &self.config
    }

    /// URL of the next result page, or `None` when this was the last one.
    pub async fn next_destination(&self) -> Result<Option<Url>, FlowError> {
        let Some(href) = self.page.next_page_href().await? else {
            debug!("no enabled next-page control");
            return Ok(None);
        };
        let current = self.page.current_url().await?;
        let next = compose_next_url(
            &current,
            &href,
            &self.config.cursor_params,
            &self.config.marker,
        )?;
        info!(next = %next, "next result page composed");
        Ok(Some(next))
    }
}
