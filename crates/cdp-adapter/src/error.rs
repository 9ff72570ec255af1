use std::fmt;

use autoplay_core_types::PageError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// High-level error categories surfaced by the adapter.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum AdapterErrorKind {
    #[error("browser launch failed")]
    Launch,
    #[error("navigation failed")]
    Navigation,
    #[error("cdp i/o failure")]
    CdpIo,
    #[error("page script failed")]
    Script,
    #[error("internal error")]
    Internal,
}

/// Enriched error metadata passed back to the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdapterError {
    pub kind: AdapterErrorKind,
    pub hint: Option<String>,
    pub retriable: bool,
    pub data: Option<serde_json::Value>,
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(hint) = &self.hint {
            write!(f, ": {}", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for AdapterError {}

impl AdapterError {
    pub fn new(kind: AdapterErrorKind) -> Self {
        Self {
            kind,
            hint: None,
            retriable: false,
            data: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn retriable(mut self, flag: bool) -> Self {
        self.retriable = flag;
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub(crate) fn cdp(err: chromiumoxide::error::CdpError) -> Self {
        AdapterError::new(AdapterErrorKind::CdpIo)
            .with_hint(err.to_string())
            .retriable(true)
    }
}

impl From<AdapterError> for PageError {
    fn from(err: AdapterError) -> Self {
        let message = err.to_string();
        match err.kind {
            AdapterErrorKind::Navigation => PageError::Navigation(message),
            AdapterErrorKind::Script => PageError::Script(message),
            AdapterErrorKind::Launch | AdapterErrorKind::CdpIo | AdapterErrorKind::Internal => {
                PageError::Io(message)
            }
        }
    }
}
