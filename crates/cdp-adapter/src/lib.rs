//! Chromium backend for the autoplay engine.
//!
//! [`ChromiumSession`] launches a browser through chromiumoxide and opens the
//! dictionary page; [`ChromiumPage`] implements the engine's `HostPage`,
//! `ControlPanel` and `AudioProbe` seams by evaluating the helper bundle in
//! [`scripts`]. All knowledge of the dictionary's markup lives in
//! [`PageSelectors`].

pub mod config;
pub mod error;
pub mod page;
pub mod scripts;

pub use config::{chrome_executable_names, detect_chrome_executable, CdpConfig, PageSelectors};
pub use error::{AdapterError, AdapterErrorKind};
pub use page::{ChromiumPage, ChromiumSession};
