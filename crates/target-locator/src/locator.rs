//! Target resolution across layout variants

use std::sync::Arc;

use autoplay_core_types::{ElementRef, HostPage, LayoutVariant, LocatorKey, PageShape};
use tracing::{debug, warn};
use url::Url;

use crate::types::{Located, TargetSet};

/// Finds the live renderings of an item on the page.
///
/// Every call goes back to the page; element references are never cached
/// because the page may re-render rows while keeping their logical identity.
/// Absence is not an error: page failures are logged and read as "not found".
#[derive(Clone)]
pub struct TargetLocator {
    page: Arc<dyn HostPage>,
}

impl TargetLocator {
    pub fn new(page: Arc<dyn HostPage>) -> Self {
        Self { page }
    }

    pub async fn locate(&self, shape: PageShape, key: &LocatorKey) -> Located {
        let mut targets = TargetSet::default();
        let mut visible = Vec::new();

        match key {
            LocatorKey::Url(item_url) => {
                let base = match self.page.current_url().await {
                    Ok(url) => Some(url),
                    Err(err) => {
                        warn!(error = %err, "page url unavailable, matching absolute hrefs only");
                        None
                    }
                };

                for &variant in shape.variants() {
                    let Some(element) = self.match_link(variant, item_url, base.as_ref()).await
                    else {
                        continue;
                    };
                    if let Some(is_visible) = self.attached_visibility(&element).await {
                        if is_visible {
                            visible.push(element.clone());
                        }
                        targets.set(variant, element);
                    }
                }
            }
            LocatorKey::Node(node) => {
                if let Some(is_visible) = self.attached_visibility(node).await {
                    if is_visible {
                        visible.push(node.clone());
                    }
                    targets.set(LayoutVariant::Direct, node.clone());
                }
            }
        }

        if targets.is_empty() {
            debug!(key = %key, "no rendering found for item");
            return Located::default();
        }

        let degraded = visible.is_empty();
        let preferred = if degraded {
            warn!(key = %key, "no visible rendering, falling back to hidden targets");
            targets.elements()
        } else {
            visible
        };

        Located {
            targets,
            preferred,
            degraded,
        }
    }

    /// First link inside `variant` whose resolved href equals `item_url`.
    async fn match_link(
        &self,
        variant: LayoutVariant,
        item_url: &Url,
        base: Option<&Url>,
    ) -> Option<ElementRef> {
        let links = match self.page.variant_links(variant).await {
            Ok(links) => links,
            Err(err) => {
                warn!(?variant, error = %err, "could not list variant links");
                return None;
            }
        };

        links
            .into_iter()
            .find(|link| resolve_href(base, &link.href).as_ref() == Some(item_url))
            .map(|link| link.container)
    }

    /// `Some(visible)` while the element is attached, `None` once it is gone.
    async fn attached_visibility(&self, element: &ElementRef) -> Option<bool> {
        match self.page.element_box(element).await {
            Ok(Some(rect)) => Some(rect.is_visible()),
            Ok(None) => None,
            Err(err) => {
                debug!(element = %element, error = %err, "element geometry unavailable");
                None
            }
        }
    }
}

/// Resolve a link target the way the browser would.
pub fn resolve_href(base: Option<&Url>, href: &str) -> Option<Url> {
    match base {
        Some(base) => base.join(href).ok(),
        None => Url::parse(href).ok(),
    }
}
