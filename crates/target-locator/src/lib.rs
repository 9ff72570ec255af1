//! Target location and highlight bookkeeping
//!
//! This crate implements:
//! - Re-resolution of an item's on-page renderings across layout variants
//! - The visibility policy that picks scroll and highlight targets
//! - The highlight manager that owns the single remembered target set

pub mod errors;
pub mod highlight;
pub mod locator;
pub mod types;

pub use errors::*;
pub use highlight::*;
pub use locator::*;
pub use types::*;
