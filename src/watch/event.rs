// src/watch/event.rs

use std::path::PathBuf;

/// Kind of low-level notification produced by a watcher backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawEventKind {
    /// Something at `path` was created, modified, or removed.
    Change,
    /// The backend dropped or coalesced events; precise information is lost.
    Overflow,
    /// The backend reported an event it could not classify.
    Undefined,
}

/// A single notification from a watcher backend. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: RawEventKind,
    pub path: Option<PathBuf>,
    /// Set when the backend reported a fatal failure alongside this event.
    pub error: Option<String>,
}

impl RawEvent {
    pub fn change(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: RawEventKind::Change,
            path: Some(path.into()),
            error: None,
        }
    }

    pub fn overflow() -> Self {
        Self {
            kind: RawEventKind::Overflow,
            path: None,
            error: None,
        }
    }

    pub fn undefined(path: Option<PathBuf>) -> Self {
        Self {
            kind: RawEventKind::Undefined,
            path,
            error: None,
        }
    }

    /// A fatal backend failure. Surfaces as an undefined event carrying the
    /// error text.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            kind: RawEventKind::Undefined,
            path: None,
            error: Some(message.into()),
        }
    }
}
