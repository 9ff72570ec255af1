//! Collaborator traits implemented by page backends.

use async_trait::async_trait;
use url::Url;

use crate::{
    ControlCommand, ControlsView, ElementBox, ElementRef, HostLoad, LayoutVariant, LinkRef,
    PageError, PageScan, StatusLine, TriggerHandle, VisualState,
};

/// The host page as seen by the playback engine.
///
/// Implementations own every selector and markup convention; the engine only
/// deals in [`ElementRef`]s and the handful of operations below. Element
/// references must be re-resolved on every call, since the page may re-render
/// nodes while keeping their logical identity.
#[async_trait]
pub trait HostPage: Send + Sync {
    /// URL of the top-level document.
    async fn current_url(&self) -> Result<Url, PageError>;

    /// Ordered list of entry candidates on the page.
    async fn scan(&self) -> Result<PageScan, PageError>;

    /// Entry links rendered inside one layout variant, in document order.
    async fn variant_links(&self, variant: LayoutVariant) -> Result<Vec<LinkRef>, PageError>;

    /// Geometry of an element, `None` when it is no longer attached.
    async fn element_box(&self, element: &ElementRef) -> Result<Option<ElementBox>, PageError>;

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<(), PageError>;

    async fn set_visual(&self, element: &ElementRef, state: VisualState) -> Result<(), PageError>;

    /// Activate an audio-trigger control.
    async fn activate(&self, trigger: &TriggerHandle) -> Result<(), PageError>;

    /// Show the modal host (backdrop plus embedded frame) on `url` and wait for it to load.
    async fn open_host(&self, url: &Url) -> Result<HostLoad, PageError>;

    /// URL currently shown by the modal host, if one exists.
    async fn host_url(&self) -> Result<Option<Url>, PageError>;

    /// Audio-trigger controls inside the embedded document, in document order.
    async fn host_triggers(&self) -> Result<Vec<TriggerHandle>, PageError>;

    /// Remove the modal host. Calling it with no host is a no-op.
    async fn close_host(&self) -> Result<(), PageError>;

    /// Target href of the enabled "next page" control.
    async fn next_page_href(&self) -> Result<Option<String>, PageError>;

    async fn navigate(&self, url: &Url) -> Result<(), PageError>;

    /// Rewrite the address bar without reloading.
    async fn replace_url(&self, url: &Url) -> Result<(), PageError>;
}

/// On-page control surface: buttons, status text and notices.
#[async_trait]
pub trait ControlPanel: Send + Sync {
    /// Install start/pause/stop buttons and per-row start buttons. Idempotent.
    async fn install_controls(&self) -> Result<(), PageError>;

    async fn render_controls(&self, view: ControlsView, status: StatusLine)
        -> Result<(), PageError>;

    /// Blocking, user-facing notice.
    async fn show_notice(&self, message: &str) -> Result<(), PageError>;

    /// Commands queued by the user since the previous call.
    async fn drain_commands(&self) -> Result<Vec<ControlCommand>, PageError>;
}
