//! In-memory page backend.
//!
//! Renders a result page of [`SimEntry`]s in either shape and records
//! everything the engine does to it. Used by the `demo` subcommand and by the
//! scenario tests.

use std::collections::HashMap;

use async_trait::async_trait;
use autoplay_core_types::{
    Candidate, ControlCommand, ControlPanel, ControlsView, ElementBox, ElementRef, HostLoad,
    HostPage, LayoutVariant, LinkRef, LocatorKey, PageError, PageScan, PageShape, StatusLine,
    TriggerHandle, VisualState,
};
use parking_lot::Mutex;
use playback_primitives::AudioProbe;
use tokio::sync::broadcast;
use url::Url;

/// What the metadata probe does for one clip.
#[derive(Clone, Debug, PartialEq)]
pub enum ProbeBehavior {
    Duration(f64),
    Error,
    /// Never answers.
    Hang,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimClip {
    /// Raw declared resource, as the page attribute would carry it.
    pub resource: Option<String>,
    pub probe: ProbeBehavior,
}

impl SimClip {
    pub fn new(path: impl Into<String>, seconds: f64) -> Self {
        Self {
            resource: Some(path.into()),
            probe: ProbeBehavior::Duration(seconds),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SimEntry {
    pub url: Url,
    pub has_audio: bool,
    pub clips: Vec<SimClip>,
    /// The entry page fails to load in the host.
    pub load_fails: bool,
    /// The entry is rendered where the locator looks for it.
    pub rendered: bool,
}

impl SimEntry {
    /// Entry `id` with `clips` clips of `seconds` each.
    pub fn new(origin: &Url, id: usize, clips: usize, seconds: f64) -> Self {
        let url = origin
            .join(&format!("/und-hani/su/{id}"))
            .unwrap_or_else(|_| origin.clone());
        Self {
            url,
            has_audio: clips > 0,
            clips: (0..clips)
                .map(|clip| SimClip::new(format!("/media/{id}-{clip}.mp3"), seconds))
                .collect(),
            load_fails: false,
            rendered: true,
        }
    }

    pub fn silent(origin: &Url, id: usize) -> Self {
        Self::new(origin, id, 0, 0.0)
    }
}

/// Observable side effects.
#[derive(Clone, Debug, PartialEq)]
pub enum SimEvent {
    HostOpened(Url),
    HostClosed,
    Activated {
        element: ElementRef,
        resource: Option<String>,
    },
    Visual {
        element: ElementRef,
        state: VisualState,
    },
    Navigated(Url),
    Notice(String),
    Rendered {
        view: ControlsView,
        status: StatusLine,
    },
}

#[derive(Default)]
struct SimState {
    current: Option<Url>,
    host: Option<Url>,
    next_href: Option<String>,
    visuals: HashMap<ElementRef, VisualState>,
    activations: Vec<ElementRef>,
    hosts_opened: usize,
    navigations: Vec<Url>,
    notices: Vec<String>,
    controls_installed: bool,
    rendered: Option<(ControlsView, StatusLine)>,
    commands: Vec<ControlCommand>,
}

pub struct SimulatedPage {
    shape: PageShape,
    entries: Vec<SimEntry>,
    state: Mutex<SimState>,
    events: broadcast::Sender<SimEvent>,
}

impl SimulatedPage {
    pub fn new(shape: PageShape, page_url: Url, entries: Vec<SimEntry>) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            shape,
            entries,
            state: Mutex::new(SimState {
                current: Some(page_url),
                ..SimState::default()
            }),
            events,
        }
    }

    /// Page with `count` entries; every `silent_every`-th entry (if non-zero) has no audio.
    pub fn demo(
        shape: PageShape,
        page_url: Url,
        count: usize,
        silent_every: usize,
        seconds: f64,
    ) -> Self {
        let entries = (0..count)
            .map(|id| {
                if silent_every > 0 && (id + 1) % silent_every == 0 {
                    SimEntry::silent(&page_url, id)
                } else {
                    SimEntry::new(&page_url, id, 2, seconds)
                }
            })
            .collect();
        Self::new(shape, page_url, entries)
    }

    pub fn with_next_page(self, href: impl Into<String>) -> Self {
        self.state.lock().next_href = Some(href.into());
        self
    }

    pub fn entries(&self) -> &[SimEntry] {
        &self.entries
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.events.subscribe()
    }

    /// Queue a command as if the user clicked an on-page control.
    pub fn push_command(&self, command: ControlCommand) {
        self.state.lock().commands.push(command);
    }

    /// Elements carrying the active or paused treatment, sorted.
    pub fn highlighted(&self) -> Vec<ElementRef> {
        let state = self.state.lock();
        let mut marked: Vec<ElementRef> = state
            .visuals
            .iter()
            .filter(|(_, visual)| matches!(visual, VisualState::Active | VisualState::Paused))
            .map(|(element, _)| element.clone())
            .collect();
        marked.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        marked
    }

    pub fn visual(&self, element: &ElementRef) -> Option<VisualState> {
        self.state.lock().visuals.get(element).copied()
    }

    pub fn host(&self) -> Option<Url> {
        self.state.lock().host.clone()
    }

    pub fn hosts_opened(&self) -> usize {
        self.state.lock().hosts_opened
    }

    pub fn activations(&self) -> Vec<ElementRef> {
        self.state.lock().activations.clone()
    }

    pub fn navigations(&self) -> Vec<Url> {
        self.state.lock().navigations.clone()
    }

    pub fn notices(&self) -> Vec<String> {
        self.state.lock().notices.clone()
    }

    pub fn rendered(&self) -> Option<(ControlsView, StatusLine)> {
        self.state.lock().rendered
    }

    pub fn controls_installed(&self) -> bool {
        self.state.lock().controls_installed
    }

    /// Element id of a clip control inside the host.
    pub fn clip_element(entry: usize, clip: usize) -> ElementRef {
        ElementRef::new(format!("host-{entry}-clip-{clip}"))
    }

    pub fn row_element(variant: LayoutVariant, entry: usize) -> ElementRef {
        match variant {
            LayoutVariant::Wide => ElementRef::new(format!("wide-{entry}")),
            LayoutVariant::Narrow => ElementRef::new(format!("narrow-{entry}")),
            LayoutVariant::Direct => ElementRef::new(format!("item-{entry}")),
        }
    }

    pub fn trigger_element(entry: usize) -> ElementRef {
        ElementRef::new(format!("trigger-{entry}"))
    }

    fn emit(&self, event: SimEvent) {
        let _ = self.events.send(event);
    }

    fn entry_by_url(&self, url: &Url) -> Option<(usize, &SimEntry)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, entry)| &entry.url == url)
    }

    fn current(&self) -> Result<Url, PageError> {
        self.state
            .lock()
            .current
            .clone()
            .ok_or_else(|| PageError::Navigation("page has no url".into()))
    }

    /// Parse `prefix-<entry>` and `host-<entry>-clip-<clip>` element ids.
    fn parse_element(element: &ElementRef) -> Option<(&str, usize, Option<usize>)> {
        let id = element.as_str();
        if let Some(rest) = id.strip_prefix("host-") {
            let (entry, clip) = rest.split_once("-clip-")?;
            return Some(("host", entry.parse().ok()?, Some(clip.parse().ok()?)));
        }
        let (prefix, entry) = id.rsplit_once('-')?;
        Some((prefix, entry.parse().ok()?, None))
    }
}

const SHOWN: ElementBox = ElementBox {
    width: 640.0,
    height: 32.0,
    has_layout_parent: true,
};

const HIDDEN: ElementBox = ElementBox {
    width: 0.0,
    height: 0.0,
    has_layout_parent: false,
};

#[async_trait]
impl HostPage for SimulatedPage {
    async fn current_url(&self) -> Result<Url, PageError> {
        self.current()
    }

    async fn scan(&self) -> Result<PageScan, PageError> {
        let candidates = self
            .entries
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                let (key, trigger) = match self.shape {
                    PageShape::Table => (LocatorKey::Url(entry.url.clone()), None),
                    PageShape::List => (
                        LocatorKey::Node(Self::row_element(LayoutVariant::Direct, index)),
                        entry.has_audio.then(|| TriggerHandle {
                            element: Self::trigger_element(index),
                            declared_resource: entry
                                .clips
                                .first()
                                .and_then(|clip| clip.resource.clone()),
                        }),
                    ),
                };
                Candidate {
                    raw_index: index,
                    key,
                    has_audio: entry.has_audio,
                    trigger,
                }
            })
            .collect();
        Ok(PageScan {
            shape: self.shape,
            candidates,
        })
    }

    async fn variant_links(&self, variant: LayoutVariant) -> Result<Vec<LinkRef>, PageError> {
        let links = match (self.shape, variant) {
            (PageShape::Table, LayoutVariant::Wide | LayoutVariant::Narrow) => self
                .entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.rendered)
                .map(|(index, entry)| LinkRef {
                    container: Self::row_element(variant, index),
                    href: entry.url.path().to_string(),
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(links)
    }

    async fn element_box(&self, element: &ElementRef) -> Result<Option<ElementBox>, PageError> {
        let Some((prefix, index, clip)) = Self::parse_element(element) else {
            return Ok(None);
        };
        let Some(entry) = self.entries.get(index) else {
            return Ok(None);
        };
        let rect = match (prefix, clip) {
            ("host", Some(clip)) => {
                let open = self.state.lock().host.as_ref() == Some(&entry.url);
                (open && clip < entry.clips.len()).then_some(SHOWN)
            }
            ("wide", None) | ("item", None) => entry.rendered.then_some(SHOWN),
            ("narrow", None) => entry.rendered.then_some(HIDDEN),
            ("trigger", None) => entry.rendered.then_some(SHOWN),
            _ => None,
        };
        Ok(rect)
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<(), PageError> {
        match self.element_box(element).await? {
            Some(_) => Ok(()),
            None => Err(PageError::Detached(element.to_string())),
        }
    }

    async fn set_visual(&self, element: &ElementRef, state: VisualState) -> Result<(), PageError> {
        {
            let mut sim = self.state.lock();
            if state == VisualState::Neutral {
                sim.visuals.remove(element);
            } else {
                sim.visuals.insert(element.clone(), state);
            }
        }
        self.emit(SimEvent::Visual {
            element: element.clone(),
            state,
        });
        Ok(())
    }

    async fn activate(&self, trigger: &TriggerHandle) -> Result<(), PageError> {
        self.state.lock().activations.push(trigger.element.clone());
        self.emit(SimEvent::Activated {
            element: trigger.element.clone(),
            resource: trigger.declared_resource.clone(),
        });
        Ok(())
    }

    async fn open_host(&self, url: &Url) -> Result<HostLoad, PageError> {
        let Some((_, entry)) = self.entry_by_url(url) else {
            return Ok(HostLoad::Failed(format!("no such entry: {url}")));
        };
        {
            let mut state = self.state.lock();
            state.host = Some(url.clone());
            state.hosts_opened += 1;
        }
        self.emit(SimEvent::HostOpened(url.clone()));
        if entry.load_fails {
            return Ok(HostLoad::Failed("entry page returned an error".into()));
        }
        Ok(HostLoad::Loaded)
    }

    async fn host_url(&self) -> Result<Option<Url>, PageError> {
        Ok(self.state.lock().host.clone())
    }

    async fn host_triggers(&self) -> Result<Vec<TriggerHandle>, PageError> {
        let Some(host) = self.state.lock().host.clone() else {
            return Err(PageError::Detached("no host open".into()));
        };
        let Some((index, entry)) = self.entry_by_url(&host) else {
            return Ok(Vec::new());
        };
        Ok(entry
            .clips
            .iter()
            .enumerate()
            .map(|(clip, spec)| TriggerHandle {
                element: Self::clip_element(index, clip),
                declared_resource: spec.resource.clone(),
            })
            .collect())
    }

    async fn close_host(&self) -> Result<(), PageError> {
        let closed = self.state.lock().host.take();
        if closed.is_some() {
            self.emit(SimEvent::HostClosed);
        }
        Ok(())
    }

    async fn next_page_href(&self) -> Result<Option<String>, PageError> {
        Ok(self.state.lock().next_href.clone())
    }

    async fn navigate(&self, url: &Url) -> Result<(), PageError> {
        {
            let mut state = self.state.lock();
            state.navigations.push(url.clone());
            state.current = Some(url.clone());
        }
        self.emit(SimEvent::Navigated(url.clone()));
        Ok(())
    }

    async fn replace_url(&self, url: &Url) -> Result<(), PageError> {
        self.state.lock().current = Some(url.clone());
        Ok(())
    }
}

#[async_trait]
impl AudioProbe for SimulatedPage {
    async fn probe_duration(&self, resource: &Url) -> Result<Option<f64>, PageError> {
        let behavior = self
            .entries
            .iter()
            .flat_map(|entry| entry.clips.iter())
            .find(|clip| {
                clip.resource.as_deref() == Some(resource.path())
                    || clip.resource.as_deref() == Some(resource.as_str())
            })
            .map(|clip| clip.probe.clone());

        match behavior {
            Some(ProbeBehavior::Duration(seconds)) => Ok(Some(seconds)),
            Some(ProbeBehavior::Error) => Err(PageError::Script("media decode error".into())),
            Some(ProbeBehavior::Hang) => std::future::pending().await,
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ControlPanel for SimulatedPage {
    async fn install_controls(&self) -> Result<(), PageError> {
        self.state.lock().controls_installed = true;
        Ok(())
    }

    async fn render_controls(
        &self,
        view: ControlsView,
        status: StatusLine,
    ) -> Result<(), PageError> {
        self.state.lock().rendered = Some((view, status));
        self.emit(SimEvent::Rendered { view, status });
        Ok(())
    }

    async fn show_notice(&self, message: &str) -> Result<(), PageError> {
        self.state.lock().notices.push(message.to_string());
        self.emit(SimEvent::Notice(message.to_string()));
        Ok(())
    }

    async fn drain_commands(&self) -> Result<Vec<ControlCommand>, PageError> {
        Ok(std::mem::take(&mut self.state.lock().commands))
    }
}
