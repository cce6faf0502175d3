// src/watch/collector.rs

//! Accumulates watch roots from executed tasks during one build iteration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::fs::FileSystem;
use crate::watch::path_utils::{canonicalize_if_exists, is_same_or_child_of, resolve_existing_prefix};
use crate::watch::root::{WatchRoot, WatchedPathSet};

/// Input paths declared by one task.
///
/// `trees` are directory-backed inputs and become recursive directory roots;
/// `files` are individual files and become file roots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskInputs {
    pub trees: Vec<PathBuf>,
    pub files: Vec<PathBuf>,
}

impl TaskInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tree(mut self, path: impl Into<PathBuf>) -> Self {
        self.trees.push(path.into());
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty() && self.files.is_empty()
    }
}

/// Counts reported by [`InputCollector::append_task_inputs`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendSummary {
    pub added: usize,
    pub excluded: usize,
}

/// Builds the [`WatchedPathSet`] for the current build iteration.
///
/// Owned by the watch session while it is collecting; not shared.
#[derive(Debug)]
pub struct InputCollector {
    fs: Arc<dyn FileSystem>,
    pending: WatchedPathSet,
}

impl InputCollector {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            pending: WatchedPathSet::new(),
        }
    }

    pub fn pending(&self) -> &WatchedPathSet {
        &self.pending
    }

    pub fn into_watched(self) -> WatchedPathSet {
        self.pending
    }

    /// Add a task's inputs, dropping anything inside `output_root`.
    ///
    /// An output root that does not exist yet excludes nothing.
    pub fn append_task_inputs(&mut self, inputs: &TaskInputs, output_root: &Path) -> AppendSummary {
        let fs = self.fs.as_ref();
        let output_root = if fs.exists(output_root) {
            Some(canonicalize_if_exists(fs, output_root))
        } else {
            trace!(?output_root, "output root does not exist; excluding nothing");
            None
        };
        let mut summary = AppendSummary::default();

        let candidates = inputs
            .trees
            .iter()
            .map(|p| (p, true))
            .chain(inputs.files.iter().map(|p| (p, false)));

        for (path, is_tree) in candidates {
            let excluded = output_root
                .as_deref()
                .is_some_and(|root| is_same_or_child_of(fs, root, path));
            if excluded {
                trace!(?path, ?output_root, "input lies under output root; not watching");
                summary.excluded += 1;
                continue;
            }

            let canonical = resolve_existing_prefix(fs, path);
            let root = if is_tree {
                WatchRoot::tree(canonical)
            } else {
                WatchRoot::file(canonical)
            };
            if self.pending.insert(root) {
                summary.added += 1;
            }
        }

        debug!(
            added = summary.added,
            excluded = summary.excluded,
            total = self.pending.len(),
            "collected task inputs"
        );
        summary
    }
}
