//! Highlight manager
//!
//! Owns the one remembered target set. Which elements are highlighted is
//! decided once per item; pause and resume only swap the treatment on that
//! same set.

use std::sync::Arc;

use autoplay_core_types::{ElementRef, HostPage, PageError, VisualState};
use tracing::{debug, warn};

use crate::errors::LocatorError;

/// Persistent treatments the manager can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Treatment {
    Active,
    Paused,
}

impl Treatment {
    fn visual(self) -> VisualState {
        match self {
            Treatment::Active => VisualState::Active,
            Treatment::Paused => VisualState::Paused,
        }
    }
}

pub struct HighlightManager {
    page: Arc<dyn HostPage>,
    last: Vec<ElementRef>,
    treatment: Option<Treatment>,
}

impl HighlightManager {
    pub fn new(page: Arc<dyn HostPage>) -> Self {
        Self {
            page,
            last: Vec::new(),
            treatment: None,
        }
    }

    /// The last applied target set.
    pub fn remembered(&self) -> &[ElementRef] {
        &self.last
    }

    pub fn treatment(&self) -> Option<Treatment> {
        self.treatment
    }

    pub async fn apply_active(&mut self, targets: &[ElementRef]) -> Result<(), LocatorError> {
        self.apply(targets, Treatment::Active).await
    }

    /// Switch highlighting to `targets`.
    ///
    /// Previously remembered elements that are not in the new set go back to
    /// neutral first; shared elements are left alone to avoid a visible flash.
    pub async fn apply(
        &mut self,
        targets: &[ElementRef],
        treatment: Treatment,
    ) -> Result<(), LocatorError> {
        let stale: Vec<ElementRef> = self
            .last
            .iter()
            .filter(|element| !targets.contains(element))
            .cloned()
            .collect();
        for element in &stale {
            if let Err(err) = self.page.set_visual(element, VisualState::Neutral).await {
                debug!(element = %element, error = %err, "could not clear stale highlight");
            }
        }

        self.last = targets.to_vec();
        self.treatment = Some(treatment);
        debug!(count = targets.len(), ?treatment, "highlight applied");
        self.mark_all(treatment.visual()).await
    }

    /// Replace the active treatment with the paused one on the remembered set.
    pub async fn apply_paused(&mut self) -> Result<(), LocatorError> {
        self.swap_treatment(Treatment::Paused).await
    }

    /// Replace the paused treatment with the active one on the remembered set.
    pub async fn resume_active(&mut self) -> Result<(), LocatorError> {
        self.swap_treatment(Treatment::Active).await
    }

    /// Strip every tracked element back to neutral and forget the set.
    pub async fn clear_all(&mut self) -> Result<(), LocatorError> {
        let result = self.mark_all(VisualState::Neutral).await;
        self.last.clear();
        self.treatment = None;
        result
    }

    async fn swap_treatment(&mut self, treatment: Treatment) -> Result<(), LocatorError> {
        if self.last.is_empty() {
            return Ok(());
        }
        self.treatment = Some(treatment);
        self.mark_all(treatment.visual()).await
    }

    /// Apply `state` to every remembered element, continuing past failures.
    async fn mark_all(&self, state: VisualState) -> Result<(), LocatorError> {
        let mut failures: Vec<PageError> = Vec::new();
        for element in &self.last {
            if let Err(err) = self.page.set_visual(element, state).await {
                warn!(element = %element, ?state, error = %err, "highlight update failed");
                failures.push(err);
            }
        }

        let failed = failures.len();
        match failures.into_iter().next() {
            None => Ok(()),
            Some(first) if failed == 1 && self.last.len() == 1 => Err(LocatorError::Page(first)),
            Some(first) => Err(LocatorError::Partial {
                failed,
                total: self.last.len(),
                first,
            }),
        }
    }
}
