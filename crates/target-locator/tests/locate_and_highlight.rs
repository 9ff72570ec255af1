use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use autoplay_core_types::{
    ElementBox, ElementRef, HostLoad, HostPage, LayoutVariant, LinkRef, LocatorKey, PageError,
    PageScan, PageShape, TriggerHandle, VisualState,
};
use parking_lot::Mutex;
use target_locator::{HighlightManager, TargetLocator, Treatment};
use url::Url;

const PAGE: &str = "https://dict.example.org/und-hani/tshiau?lui=tai";

#[derive(Default)]
struct FakePage {
    links: HashMap<LayoutVariant, Vec<LinkRef>>,
    boxes: HashMap<ElementRef, ElementBox>,
    visuals: Mutex<Vec<(ElementRef, VisualState)>>,
}

impl FakePage {
    fn link(mut self, variant: LayoutVariant, container: &str, href: &str, visible: bool) -> Self {
        self.links.entry(variant).or_default().push(LinkRef {
            container: ElementRef::new(container),
            href: href.to_string(),
        });
        self.boxes.insert(
            ElementRef::new(container),
            ElementBox {
                width: if visible { 320.0 } else { 0.0 },
                height: if visible { 24.0 } else { 0.0 },
                has_layout_parent: visible,
            },
        );
        self
    }

    fn detach(mut self, container: &str) -> Self {
        self.boxes.remove(&ElementRef::new(container));
        self
    }

    fn visual_log(&self) -> Vec<(ElementRef, VisualState)> {
        self.visuals.lock().clone()
    }
}

#[async_trait]
impl HostPage for FakePage {
    async fn current_url(&self) -> Result<Url, PageError> {
        Ok(Url::parse(PAGE).unwrap())
    }

    async fn scan(&self) -> Result<PageScan, PageError> {
        Err(PageError::Script("not scanned in these tests".into()))
    }

    async fn variant_links(&self, variant: LayoutVariant) -> Result<Vec<LinkRef>, PageError> {
        Ok(self.links.get(&variant).cloned().unwrap_or_default())
    }

    async fn element_box(&self, element: &ElementRef) -> Result<Option<ElementBox>, PageError> {
        Ok(self.boxes.get(element).copied())
    }

    async fn scroll_into_view(&self, _element: &ElementRef) -> Result<(), PageError> {
        Ok(())
    }

    async fn set_visual(&self, element: &ElementRef, state: VisualState) -> Result<(), PageError> {
        self.visuals.lock().push((element.clone(), state));
        Ok(())
    }

    async fn activate(&self, _trigger: &TriggerHandle) -> Result<(), PageError> {
        Ok(())
    }

    async fn open_host(&self, _url: &Url) -> Result<HostLoad, PageError> {
        Ok(HostLoad::Loaded)
    }

    async fn host_url(&self) -> Result<Option<Url>, PageError> {
        Ok(None)
    }

    async fn host_triggers(&self) -> Result<Vec<TriggerHandle>, PageError> {
        Ok(Vec::new())
    }

    async fn close_host(&self) -> Result<(), PageError> {
        Ok(())
    }

    async fn next_page_href(&self) -> Result<Option<String>, PageError> {
        Ok(None)
    }

    async fn navigate(&self, _url: &Url) -> Result<(), PageError> {
        Ok(())
    }

    async fn replace_url(&self, _url: &Url) -> Result<(), PageError> {
        Ok(())
    }
}

fn entry(id: u32) -> LocatorKey {
    LocatorKey::Url(Url::parse(&format!("https://dict.example.org/und-hani/su/{id}")).unwrap())
}

#[tokio::test]
async fn finds_first_match_in_each_variant() {
    let page = FakePage::default()
        .link(LayoutVariant::Wide, "wide-0", "/und-hani/su/1", true)
        .link(LayoutVariant::Wide, "wide-1", "/und-hani/su/2", true)
        .link(LayoutVariant::Wide, "wide-dup", "/und-hani/su/2", true)
        .link(LayoutVariant::Narrow, "narrow-1", "/und-hani/su/2", false);
    let locator = TargetLocator::new(Arc::new(page));

    let located = locator.locate(PageShape::Table, &entry(2)).await;
    assert_eq!(located.targets.wide, Some(ElementRef::new("wide-1")));
    assert_eq!(located.targets.narrow, Some(ElementRef::new("narrow-1")));
    assert_eq!(located.preferred, vec![ElementRef::new("wide-1")]);
    assert!(!located.degraded);
    assert_eq!(located.scroll_target(), Some(&ElementRef::new("wide-1")));
}

#[tokio::test]
async fn hidden_only_targets_degrade_instead_of_failing() {
    let page = FakePage::default().link(LayoutVariant::Narrow, "narrow-4", "/und-hani/su/4", false);
    let locator = TargetLocator::new(Arc::new(page));

    let located = locator.locate(PageShape::Table, &entry(4)).await;
    assert!(located.degraded);
    assert_eq!(located.preferred, vec![ElementRef::new("narrow-4")]);
}

#[tokio::test]
async fn missing_or_detached_items_locate_to_nothing() {
    let page = FakePage::default()
        .link(LayoutVariant::Wide, "wide-9", "/und-hani/su/9", true)
        .detach("wide-9");
    let locator = TargetLocator::new(Arc::new(page));

    assert!(locator.locate(PageShape::Table, &entry(9)).await.is_empty());
    assert!(locator.locate(PageShape::Table, &entry(10)).await.is_empty());
    let gone = LocatorKey::Node(ElementRef::new("item-3"));
    assert!(locator.locate(PageShape::List, &gone).await.is_empty());
}

#[tokio::test]
async fn node_keys_are_identity_when_attached() {
    let page = FakePage::default().link(LayoutVariant::Direct, "item-3", "#", true);
    let locator = TargetLocator::new(Arc::new(page));

    let located = locator
        .locate(PageShape::List, &LocatorKey::Node(ElementRef::new("item-3")))
        .await;
    assert_eq!(located.targets.direct, Some(ElementRef::new("item-3")));
    assert_eq!(located.preferred, vec![ElementRef::new("item-3")]);
}

#[tokio::test]
async fn switching_targets_skips_shared_elements() {
    let page = Arc::new(FakePage::default());
    let mut highlights = HighlightManager::new(page.clone());
    let a = ElementRef::new("a");
    let shared = ElementRef::new("shared");
    let b = ElementRef::new("b");

    highlights
        .apply_active(&[a.clone(), shared.clone()])
        .await
        .unwrap();
    page.visuals.lock().clear();

    highlights
        .apply_active(&[shared.clone(), b.clone()])
        .await
        .unwrap();
    let log = page.visual_log();
    assert_eq!(log[0], (a.clone(), VisualState::Neutral));
    assert!(!log.contains(&(shared.clone(), VisualState::Neutral)));
    assert!(log.contains(&(b.clone(), VisualState::Active)));
    assert_eq!(highlights.remembered(), &[shared, b]);
}

#[tokio::test]
async fn pause_and_resume_swap_treatment_on_remembered_set() {
    let page = Arc::new(FakePage::default());
    let mut highlights = HighlightManager::new(page.clone());
    let row = ElementRef::new("row");

    highlights.apply_active(&[row.clone()]).await.unwrap();
    highlights.apply_paused().await.unwrap();
    assert_eq!(highlights.treatment(), Some(Treatment::Paused));
    highlights.resume_active().await.unwrap();
    highlights.clear_all().await.unwrap();

    let states: Vec<VisualState> = page.visual_log().into_iter().map(|(_, s)| s).collect();
    assert_eq!(
        states,
        vec![
            VisualState::Active,
            VisualState::Paused,
            VisualState::Active,
            VisualState::Neutral
        ]
    );
    assert!(highlights.remembered().is_empty());
    assert_eq!(highlights.treatment(), None);

    highlights.apply_paused().await.unwrap();
    assert_eq!(page.visual_log().len(), 4);
}
