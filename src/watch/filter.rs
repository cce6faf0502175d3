// src/watch/filter.rs

//! Classification of raw backend events against the frozen watch set.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::trace;

use crate::engine::TriggerKind;
use crate::fs::FileSystem;
use crate::watch::event::{RawEvent, RawEventKind};
use crate::watch::path_utils::normalize_lexically;
use crate::watch::root::FrozenWatchSet;

/// Why an event is considered relevant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cause {
    FileChange(PathBuf),
    Overflow,
    Undefined,
    BackendFailure(String),
}

impl Cause {
    pub fn trigger_kind(&self) -> TriggerKind {
        match self {
            Cause::BackendFailure(_) => TriggerKind::Stop,
            _ => TriggerKind::Rebuild,
        }
    }

    /// Human-readable reason used for the emitted trigger.
    pub fn describe(&self) -> String {
        match self {
            Cause::FileChange(_) => "file change".to_string(),
            Cause::Overflow => "overflow in file watching".to_string(),
            Cause::Undefined => "undefined file system event".to_string(),
            Cause::BackendFailure(message) => format!("error {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relevance {
    Irrelevant,
    Relevant(Cause),
}

impl Relevance {
    pub fn is_relevant(&self) -> bool {
        matches!(self, Relevance::Relevant(_))
    }
}

/// Stateless classifier; safe to share between threads.
#[derive(Debug, Clone)]
pub struct EventFilter {
    roots: Arc<FrozenWatchSet>,
    fs: Option<Arc<dyn FileSystem>>,
}

impl EventFilter {
    pub fn new(roots: Arc<FrozenWatchSet>) -> Self {
        Self { roots, fs: None }
    }

    /// Also try the canonical form of event paths that miss on the first
    /// lookup (e.g. macOS reporting `/private/var/...` for `/var/...`).
    pub fn with_canonicalization(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn classify(&self, event: &RawEvent) -> Relevance {
        if let Some(message) = &event.error {
            return Relevance::Relevant(Cause::BackendFailure(message.clone()));
        }

        match (event.kind, &event.path) {
            (RawEventKind::Overflow, _) => Relevance::Relevant(Cause::Overflow),
            (RawEventKind::Undefined, _) | (RawEventKind::Change, None) => {
                Relevance::Relevant(Cause::Undefined)
            }
            (RawEventKind::Change, Some(path)) => {
                if self.is_watched(path) {
                    Relevance::Relevant(Cause::FileChange(path.clone()))
                } else {
                    trace!(?path, "ignoring change outside watched roots");
                    Relevance::Irrelevant
                }
            }
        }
    }

    fn is_watched(&self, path: &Path) -> bool {
        if self.roots.matches(&normalize_lexically(path)) {
            return true;
        }
        match &self.fs {
            Some(fs) if fs.exists(path) => fs
                .canonicalize(path)
                .map(|canonical| self.roots.matches(&canonical))
                .unwrap_or(false),
            _ => false,
        }
    }
}
