//! Flow error types

use autoplay_core_types::PageError;
use target_locator::LocatorError;
use thiserror::Error;

/// Flow errors
#[derive(Debug, Error)]
pub enum FlowError {
    /// Nothing playable was found on the page
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Requested start row lies past the last playable entry
    #[error("No playable entry at or after row {index}")]
    StartOutOfRange { index: usize },

    /// Next page URL could not be composed
    #[error(transparent)]
    Pagination(#[from] PaginationError),

    /// Page backend failure
    #[error("Page error: {0}")]
    Page(#[from] PageError),

    /// Highlight bookkeeping failure
    #[error("Locator error: {0}")]
    Locator(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    /// Errors that stop a run from starting and are shown to the user.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            FlowError::Discovery(_) | FlowError::StartOutOfRange { .. } | FlowError::Pagination(_)
        )
    }
}

impl From<LocatorError> for FlowError {
    fn from(err: LocatorError) -> Self {
        FlowError::Locator(err.to_string())
    }
}

/// Pagination URL composition errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PaginationError {
    #[error("Invalid next-page link '{href}': {reason}")]
    InvalidHref { href: String, reason: String },

    #[error("Next-page link '{0}' carries none of the pagination parameters")]
    NoCursor(String),
}
