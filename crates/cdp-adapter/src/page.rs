use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use autoplay_core_types::{
    Candidate, ControlCommand, ControlPanel, ControlsView, ElementBox, ElementRef, HostLoad,
    HostPage, LayoutVariant, LinkRef, LocatorKey, PageError, PageScan, PageShape, StatusLine,
    TriggerHandle, VisualState,
};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use playback_primitives::AudioProbe;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{CdpConfig, PageSelectors};
use crate::error::{AdapterError, AdapterErrorKind};
use crate::scripts::{self, Op};

/// A launched Chromium with its event handler running on a task.
pub struct ChromiumSession {
    browser: Browser,
    handler: JoinHandle<()>,
    host_load_timeout_ms: Option<u64>,
}

impl ChromiumSession {
    pub async fn launch(config: &CdpConfig) -> Result<Self, AdapterError> {
        let browser_config = browser_config(config)?;
        info!(
            executable = %config.executable.display(),
            headless = config.headless,
            "launching chromium"
        );
        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::Launch)
                .with_hint(format!("failed to launch chromium: {err}"))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    debug!(error = %err, "cdp handler reported an error");
                }
            }
            debug!("cdp handler finished");
        });

        Ok(Self {
            browser,
            handler,
            host_load_timeout_ms: config.host_load_timeout_ms,
        })
    }

    /// Open `url` in a new tab and wait for it to load.
    pub async fn open(
        &self,
        url: &Url,
        selectors: PageSelectors,
    ) -> Result<Arc<ChromiumPage>, AdapterError> {
        let page = self
            .browser
            .new_page(url.as_str())
            .await
            .map_err(AdapterError::cdp)?;
        page.wait_for_navigation().await.map_err(|err| {
            AdapterError::new(AdapterErrorKind::Navigation)
                .with_hint(err.to_string())
                .with_data(json!({ "url": url.as_str() }))
        })?;
        debug!(url = %url, "page opened");
        Ok(Arc::new(
            ChromiumPage::new(page, selectors).with_host_load_timeout(self.host_load_timeout_ms),
        ))
    }

    pub async fn close(mut self) -> Result<(), AdapterError> {
        let closed = self.browser.close().await.map_err(AdapterError::cdp);
        if let Err(err) = self.browser.wait().await {
            debug!(error = %err, "chromium did not exit cleanly");
        }
        self.handler.abort();
        closed.map(|_| ())
    }
}

fn browser_config(cfg: &CdpConfig) -> Result<BrowserConfig, AdapterError> {
    if !cfg.executable.as_os_str().is_empty() && !cfg.executable.exists() {
        return Err(AdapterError::new(AdapterErrorKind::Launch)
            .with_hint(format!(
                "chrome executable not found at {}",
                cfg.executable.display()
            ))
            .with_data(json!({
                "expected": cfg.executable,
                "hint": "Set SUTIAN_AUTOPLAY_CHROME to the full path of chrome/chromium."
            })));
    }

    let profile_dir = if cfg.user_data_dir.is_absolute() {
        cfg.user_data_dir.clone()
    } else {
        let cwd = std::env::current_dir().map_err(|err| {
            AdapterError::new(AdapterErrorKind::Internal)
                .with_hint(format!("failed to resolve cwd for user-data-dir: {err}"))
        })?;
        cwd.join(&cfg.user_data_dir)
    };
    std::fs::create_dir_all(&profile_dir).map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal)
            .with_hint(format!("failed to ensure user-data-dir: {err}"))
    })?;

    let mut builder = BrowserConfig::builder()
        .request_timeout(Duration::from_millis(cfg.request_timeout_ms))
        .launch_timeout(Duration::from_millis(cfg.launch_timeout_ms))
        .args(cfg.browser_args())
        .user_data_dir(profile_dir);
    if !cfg.headless {
        builder = builder.with_head();
    }
    if !cfg.executable.as_os_str().is_empty() {
        builder = builder.chrome_executable(cfg.executable.clone());
    }

    builder.build().map_err(|err| {
        AdapterError::new(AdapterErrorKind::Internal)
            .with_hint(format!("browser config error: {err}"))
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ShapeReply {
    Table,
    List,
}

#[derive(Deserialize)]
struct CandidateReply {
    raw_index: usize,
    href: Option<String>,
    node: ElementRef,
    trigger: Option<TriggerHandle>,
    has_audio: bool,
}

#[derive(Deserialize)]
struct ScanReply {
    shape: Option<ShapeReply>,
    candidates: Vec<CandidateReply>,
}

#[derive(Deserialize)]
struct HostLoadReply {
    loaded: bool,
    reason: Option<String>,
}

/// One dictionary tab driven through the helper bundle.
pub struct ChromiumPage {
    page: Page,
    selectors: PageSelectors,
    host_load_timeout_ms: Option<u64>,
}

impl ChromiumPage {
    pub fn new(page: Page, selectors: PageSelectors) -> Self {
        Self {
            page,
            selectors,
            host_load_timeout_ms: None,
        }
    }

    pub fn with_host_load_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.host_load_timeout_ms = timeout_ms;
        self
    }

    pub fn selectors(&self) -> &PageSelectors {
        &self.selectors
    }

    /// Wait for the tab's next navigation to finish and return where it landed.
    pub async fn wait_for_load(&self) -> Result<Url, PageError> {
        self.page
            .wait_for_navigation()
            .await
            .map_err(|err| PageError::Navigation(err.to_string()))?;
        self.current_url().await
    }

    async fn call<T: DeserializeOwned>(&self, op: Op, args: Value) -> Result<T, PageError> {
        let expression = scripts::call(op, &self.selectors, &args);
        let result = self
            .page
            .evaluate(expression)
            .await
            .map_err(|err| PageError::from(AdapterError::cdp(err)))?;
        let value = result.value().cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|err| {
            PageError::from(
                AdapterError::new(AdapterErrorKind::Script)
                    .with_hint(format!("{} returned an unexpected shape: {err}", op.method())),
            )
        })
    }

    /// Run an element operation; `false` from the page means the element is gone.
    async fn on_element(&self, op: Op, element: &ElementRef, extra: Value) -> Result<(), PageError> {
        let mut args = json!({ "element": element });
        if let (Some(args), Value::Object(extra)) = (args.as_object_mut(), extra) {
            args.extend(extra);
        }
        if self.call::<bool>(op, args).await? {
            Ok(())
        } else {
            Err(PageError::Detached(element.to_string()))
        }
    }
}

#[async_trait]
impl HostPage for ChromiumPage {
    async fn current_url(&self) -> Result<Url, PageError> {
        let raw = self
            .page
            .url()
            .await
            .map_err(|err| PageError::from(AdapterError::cdp(err)))?
            .ok_or_else(|| PageError::Navigation("page has no url".into()))?;
        Url::parse(&raw).map_err(|err| PageError::Navigation(format!("{raw}: {err}")))
    }

    async fn scan(&self) -> Result<PageScan, PageError> {
        let reply: ScanReply = self.call(Op::Scan, Value::Null).await?;
        let Some(shape) = reply.shape else {
            debug!("no result table or list on page");
            return Ok(PageScan {
                shape: PageShape::Table,
                candidates: Vec::new(),
            });
        };

        let shape = match shape {
            ShapeReply::Table => PageShape::Table,
            ShapeReply::List => PageShape::List,
        };
        let base = self.current_url().await?;
        let candidates = reply
            .candidates
            .into_iter()
            .map(|candidate| {
                let entry = match shape {
                    PageShape::Table => candidate.href.as_deref().and_then(|href| base.join(href).ok()),
                    PageShape::List => None,
                };
                let has_audio = match shape {
                    PageShape::Table => candidate.has_audio && entry.is_some(),
                    PageShape::List => candidate.has_audio && candidate.trigger.is_some(),
                };
                Candidate {
                    raw_index: candidate.raw_index,
                    key: entry
                        .map(LocatorKey::Url)
                        .unwrap_or(LocatorKey::Node(candidate.node)),
                    has_audio,
                    trigger: candidate.trigger,
                }
            })
            .collect::<Vec<_>>();
        debug!(?shape, count = candidates.len(), "page scanned");
        Ok(PageScan { shape, candidates })
    }

    async fn variant_links(&self, variant: LayoutVariant) -> Result<Vec<LinkRef>, PageError> {
        let name = match variant {
            LayoutVariant::Wide => "wide",
            LayoutVariant::Narrow => "narrow",
            LayoutVariant::Direct => "direct",
        };
        self.call(Op::VariantLinks, json!({ "variant": name })).await
    }

    async fn element_box(&self, element: &ElementRef) -> Result<Option<ElementBox>, PageError> {
        self.call(Op::ElementBox, json!({ "element": element })).await
    }

    async fn scroll_into_view(&self, element: &ElementRef) -> Result<(), PageError> {
        self.on_element(Op::ScrollIntoView, element, Value::Null).await
    }

    async fn set_visual(&self, element: &ElementRef, state: VisualState) -> Result<(), PageError> {
        self.on_element(Op::SetVisual, element, json!({ "state": state }))
            .await
    }

    async fn activate(&self, trigger: &TriggerHandle) -> Result<(), PageError> {
        self.on_element(Op::Activate, &trigger.element, Value::Null)
            .await
    }

    async fn open_host(&self, url: &Url) -> Result<HostLoad, PageError> {
        let reply: HostLoadReply = self
            .call(Op::OpenHost, host_load_args(url, self.host_load_timeout_ms))
            .await?;
        if reply.loaded {
            Ok(HostLoad::Loaded)
        } else {
            Ok(HostLoad::Failed(
                reply.reason.unwrap_or_else(|| "unknown".into()),
            ))
        }
    }

    async fn host_url(&self) -> Result<Option<Url>, PageError> {
        let raw: Option<String> = self.call(Op::HostUrl, Value::Null).await?;
        Ok(raw.and_then(|raw| match Url::parse(&raw) {
            Ok(url) => Some(url),
            Err(err) => {
                warn!(url = %raw, error = %err, "host reports an unparsable url");
                None
            }
        }))
    }

    async fn host_triggers(&self) -> Result<Vec<TriggerHandle>, PageError> {
        self.call(Op::HostTriggers, Value::Null).await
    }

    async fn close_host(&self) -> Result<(), PageError> {
        let removed: bool = self.call(Op::CloseHost, Value::Null).await?;
        if removed {
            debug!("host removed");
        }
        Ok(())
    }

    async fn next_page_href(&self) -> Result<Option<String>, PageError> {
        self.call(Op::NextPageHref, Value::Null).await
    }

    async fn navigate(&self, url: &Url) -> Result<(), PageError> {
        self.page
            .goto(url.as_str())
            .await
            .map_err(|err| PageError::Navigation(format!("{url}: {err}")))?;
        Ok(())
    }

    async fn replace_url(&self, url: &Url) -> Result<(), PageError> {
        self.call::<bool>(Op::ReplaceUrl, json!({ "url": url.as_str() }))
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ControlPanel for ChromiumPage {
    async fn install_controls(&self) -> Result<(), PageError> {
        self.call::<bool>(Op::InstallControls, Value::Null)
            .await
            .map(|_| ())
    }

    async fn render_controls(
        &self,
        view: ControlsView,
        status: StatusLine,
    ) -> Result<(), PageError> {
        let rendered: bool = self
            .call(
                Op::RenderControls,
                json!({ "view": view, "status": status.to_string() }),
            )
            .await?;
        if !rendered {
            debug!("control panel missing, render skipped");
        }
        Ok(())
    }

    async fn show_notice(&self, message: &str) -> Result<(), PageError> {
        self.call::<bool>(Op::ShowNotice, json!({ "message": message }))
            .await
            .map(|_| ())
    }

    async fn drain_commands(&self) -> Result<Vec<ControlCommand>, PageError> {
        let raw: Vec<Value> = self.call(Op::DrainCommands, Value::Null).await?;
        Ok(raw
            .into_iter()
            .filter_map(|value| match serde_json::from_value(value.clone()) {
                Ok(command) => Some(command),
                Err(err) => {
                    warn!(%value, error = %err, "ignoring unknown control command");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl AudioProbe for ChromiumPage {
    async fn probe_duration(&self, resource: &Url) -> Result<Option<f64>, PageError> {
        self.call(Op::ProbeDuration, json!({ "url": resource.as_str() }))
            .await
    }
}

fn host_load_args(url: &Url, timeout_ms: Option<u64>) -> Value {
    json!({ "url": url.as_str(), "timeout_ms": timeout_ms })
}
