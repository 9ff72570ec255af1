//! Error types for the locator and highlight manager

use autoplay_core_types::PageError;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// The page backend refused a highlight or scroll operation
    #[error("Page error: {0}")]
    Page(#[from] PageError),

    /// Several elements failed while applying one treatment
    #[error("{failed} of {total} elements could not be updated: {first}")]
    Partial {
        failed: usize,
        total: usize,
        first: PageError,
    },
}
