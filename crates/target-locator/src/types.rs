//! Core types for the locator

use autoplay_core_types::{ElementRef, LayoutVariant};
use serde::{Deserialize, Serialize};

/// Renderings of one logical item currently present in the document.
///
/// Zero to three references: one per responsive table rendering, or a single
/// direct reference on list pages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSet {
    pub wide: Option<ElementRef>,
    pub narrow: Option<ElementRef>,
    pub direct: Option<ElementRef>,
}

impl TargetSet {
    pub fn set(&mut self, variant: LayoutVariant, element: ElementRef) {
        match variant {
            LayoutVariant::Wide => self.wide = Some(element),
            LayoutVariant::Narrow => self.narrow = Some(element),
            LayoutVariant::Direct => self.direct = Some(element),
        }
    }

    pub fn get(&self, variant: LayoutVariant) -> Option<&ElementRef> {
        match variant {
            LayoutVariant::Wide => self.wide.as_ref(),
            LayoutVariant::Narrow => self.narrow.as_ref(),
            LayoutVariant::Direct => self.direct.as_ref(),
        }
    }

    /// Present references in variant order.
    pub fn elements(&self) -> Vec<ElementRef> {
        [&self.wide, &self.narrow, &self.direct]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.wide.is_none() && self.narrow.is_none() && self.direct.is_none()
    }

    pub fn contains(&self, element: &ElementRef) -> bool {
        [&self.wide, &self.narrow, &self.direct]
            .into_iter()
            .flatten()
            .any(|candidate| candidate == element)
    }
}

/// Result of one locate call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Located {
    pub targets: TargetSet,
    /// Visible targets, or every target when none is visible.
    pub preferred: Vec<ElementRef>,
    /// Set when no target was visible and `preferred` fell back to all of them.
    pub degraded: bool,
}

impl Located {
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Element to scroll into view.
    pub fn scroll_target(&self) -> Option<&ElementRef> {
        self.preferred.first()
    }
}
