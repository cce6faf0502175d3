// src/watch/index.rs

//! Prefix index over watch roots, keyed by path components.
//!
//! Lookup walks the event path one component at a time, so classifying an
//! event costs O(depth of the path) regardless of how many roots are watched.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::Path;

use crate::watch::root::WatchRoot;

#[derive(Debug, Clone, Default)]
struct Node {
    children: HashMap<OsString, Node>,
    file_root: bool,
    /// `Some(recursive)` when a directory root ends at this node.
    directory_root: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct PathIndex {
    root: Node,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, root: &WatchRoot) {
        let mut node = &mut self.root;
        for component in root.path().components() {
            node = node
                .children
                .entry(component.as_os_str().to_os_string())
                .or_default();
        }
        match root {
            WatchRoot::File(_) => node.file_root = true,
            WatchRoot::Directory { recursive, .. } => {
                // A recursive registration subsumes a shallow one.
                let merged = node.directory_root.unwrap_or(false) || *recursive;
                node.directory_root = Some(merged);
            }
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        let components: Vec<_> = path.components().collect();
        let mut node = &self.root;

        for (depth, component) in components.iter().enumerate() {
            node = match node.children.get(component.as_os_str()) {
                Some(next) => next,
                None => return false,
            };

            let remaining = components.len() - depth - 1;
            match node.directory_root {
                Some(true) => return true,
                Some(false) if remaining <= 1 => return true,
                _ => {}
            }
            if remaining == 0 && node.file_root {
                return true;
            }
        }
        false
    }
}
