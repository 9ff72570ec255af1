//! Shared primitives for the autoplay workspace.
//!
//! Everything the sequencing engine knows about the host page lives here: the
//! item model, the run phase vocabulary, and the collaborator traits a page
//! backend (Chromium or the in-memory simulation) must implement.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

pub mod page;

pub use page::{ControlPanel, HostPage};

/// Error surfaced by page backends.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    /// The referenced element is no longer part of the document.
    #[error("element detached: {0}")]
    Detached(String),

    /// A page-side script failed or returned an unexpected shape.
    #[error("page script failed: {0}")]
    Script(String),

    /// Navigation or URL handling failed.
    #[error("navigation failed: {0}")]
    Navigation(String),

    /// Transport to the browser broke down.
    #[error("browser i/o: {0}")]
    Io(String),
}

/// Identifier for one sequencer run, used to correlate log lines.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque reference to a live element owned by the page backend.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElementRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Structural rendering of the result page.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum PageShape {
    /// Multi-row table with a wide and a narrow responsive rendering; entries open in a host frame.
    Table,
    /// Single-column list; clips play inline.
    List,
}

impl PageShape {
    /// Layout variants that can carry a rendering of one logical entry.
    pub fn variants(&self) -> &'static [LayoutVariant] {
        match self {
            PageShape::Table => &[LayoutVariant::Wide, LayoutVariant::Narrow],
            PageShape::List => &[LayoutVariant::Direct],
        }
    }
}

/// One rendering of an entry on the page.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum LayoutVariant {
    Wide,
    Narrow,
    Direct,
}

/// How an item is found again on the page.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LocatorKey {
    /// Entry page URL, matched against the links of each layout variant.
    Url(Url),
    /// Direct reference to the entry element.
    Node(ElementRef),
}

impl fmt::Display for LocatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorKey::Url(url) => write!(f, "url:{}", url),
            LocatorKey::Node(node) => write!(f, "node:{}", node),
        }
    }
}

/// Audio-trigger control as exposed by the page.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TriggerHandle {
    pub element: ElementRef,
    /// Raw value of the control's declared audio resource.
    pub declared_resource: Option<String>,
}

/// One entry reported by page discovery, before filtering.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Candidate {
    pub raw_index: usize,
    pub key: LocatorKey,
    pub has_audio: bool,
    pub trigger: Option<TriggerHandle>,
}

/// Result of scanning the page for entries.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageScan {
    pub shape: PageShape,
    pub candidates: Vec<Candidate>,
}

/// One unit of playback work.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlaybackItem {
    /// Position in the unfiltered candidate list.
    pub original_index: usize,
    pub key: LocatorKey,
    pub trigger: Option<TriggerHandle>,
}

/// A link found inside one layout variant.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct LinkRef {
    /// Element to highlight and scroll to (the row or card holding the link).
    pub container: ElementRef,
    pub href: String,
}

/// Rendered geometry of an attached element.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ElementBox {
    pub width: f64,
    pub height: f64,
    pub has_layout_parent: bool,
}

impl ElementBox {
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.has_layout_parent
    }
}

/// Visual treatment applied to page elements.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualState {
    Neutral,
    Active,
    Paused,
    /// Transient marker on the clip control currently sounding.
    NowPlaying,
}

/// Outcome of loading the embedded entry document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HostLoad {
    Loaded,
    Failed(String),
}

/// Lifecycle phase of the playback run.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Running,
    Paused,
    Stopping,
    Completed,
}

/// Affordances the control panel should expose.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlsView {
    Idle,
    Running,
    Paused,
}

impl From<Phase> for ControlsView {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Running => ControlsView::Running,
            Phase::Paused => ControlsView::Paused,
            Phase::Idle | Phase::Stopping | Phase::Completed => ControlsView::Idle,
        }
    }
}

/// Progress text written into the control panel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StatusLine {
    Running { position: usize, total: usize },
    Paused { position: usize, total: usize },
    Cleared,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::Running { position, total } => {
                write!(f, "running ({}/{})", position + 1, total)
            }
            StatusLine::Paused { position, total } => {
                write!(f, "paused ({}/{})", position + 1, total)
            }
            StatusLine::Cleared => Ok(()),
        }
    }
}

/// How processing of one item ended.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ItemOutcome {
    Played,
    /// No usable target on the page; cursor advances without playing.
    Skipped,
    /// A pause or stop cut the item short; it is retried from the top.
    Interrupted,
    /// The item failed; logged and skipped.
    Failed(String),
}

/// Requests coming from the on-page controls or the terminal.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "row", rename_all = "snake_case")]
pub enum ControlCommand {
    Start,
    StartFromRow(usize),
    TogglePause,
    Pause,
    Resume,
    Stop,
    BackdropClicked,
}
