use std::fmt;

use device::{CaptureError, DeviceError};
use index::IndexError;
use matcher::MatchError;
use template::TemplateError;
use thiserror::Error;

/// Lifecycle state of an [`crate::EngineContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// No device session.
    Closed,
    /// Device open, templates usable, no search index.
    Open,
    /// Device open and the search index allocated.
    SearchReady,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineState::Closed => "closed",
            EngineState::Open => "open",
            EngineState::SearchReady => "search-ready",
        })
    }
}

/// Errors surfaced by engine context operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum EngineError {
    #[error("{operation} is not allowed while the engine is {state}")]
    InvalidState {
        operation: &'static str,
        state: EngineState,
    },
    #[error("search engine initialization failed: {0}")]
    EngineInitFailed(String),
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error(transparent)]
    Index(#[from] IndexError),
}
