// src/watch/root.rs

//! Watch roots and the per-iteration set of roots.
//!
//! A [`WatchedPathSet`] is built up while a build runs and then frozen into a
//! [`FrozenWatchSet`], which is shared read-only between the watcher backend
//! and the event filter for the lifetime of one armed session.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::watch::index::PathIndex;

/// A single path under observation. Paths are stored in canonical form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WatchRoot {
    /// A directory and (optionally) everything beneath it.
    Directory { path: PathBuf, recursive: bool },
    /// A single file.
    File(PathBuf),
}

impl WatchRoot {
    pub fn tree(path: impl Into<PathBuf>) -> Self {
        WatchRoot::Directory {
            path: path.into(),
            recursive: true,
        }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        WatchRoot::File(path.into())
    }

    pub fn path(&self) -> &Path {
        match self {
            WatchRoot::Directory { path, .. } => path,
            WatchRoot::File(path) => path,
        }
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, WatchRoot::Directory { .. })
    }

    /// Containment test against an already-normalized path.
    ///
    /// File roots match exactly. Directory roots match themselves and their
    /// descendants (direct children only when not recursive).
    pub fn contains(&self, candidate: &Path) -> bool {
        match self {
            WatchRoot::File(path) => candidate == path,
            WatchRoot::Directory { path, recursive } => match candidate.strip_prefix(path) {
                Ok(rest) => *recursive || rest.components().count() <= 1,
                Err(_) => false,
            },
        }
    }
}

/// Deduplicated set of roots accumulated during one build iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchedPathSet {
    roots: BTreeSet<WatchRoot>,
}

impl WatchedPathSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root. Returns false if it was already present.
    pub fn insert(&mut self, root: WatchRoot) -> bool {
        self.roots.insert(root)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn clear(&mut self) {
        self.roots.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchRoot> {
        self.roots.iter()
    }

    /// Linear containment check. Frozen sets use the prefix index instead.
    pub fn contains_path(&self, path: &Path) -> bool {
        self.roots.iter().any(|root| root.contains(path))
    }

    /// Freeze the set for handing to a watcher backend and event filter.
    pub fn freeze(self) -> FrozenWatchSet {
        FrozenWatchSet::new(self.roots)
    }
}

impl FromIterator<WatchRoot> for WatchedPathSet {
    fn from_iter<I: IntoIterator<Item = WatchRoot>>(iter: I) -> Self {
        Self {
            roots: iter.into_iter().collect(),
        }
    }
}

/// Read-only watch set with a prefix index for event lookup.
#[derive(Debug, Clone)]
pub struct FrozenWatchSet {
    directories: Vec<WatchRoot>,
    files: Vec<WatchRoot>,
    index: PathIndex,
}

impl FrozenWatchSet {
    fn new(roots: BTreeSet<WatchRoot>) -> Self {
        let mut index = PathIndex::new();
        let mut directories = Vec::new();
        let mut files = Vec::new();

        for root in roots {
            index.insert(&root);
            if root.is_directory() {
                directories.push(root);
            } else {
                files.push(root);
            }
        }

        Self {
            directories,
            files,
            index,
        }
    }

    pub fn len(&self) -> usize {
        self.directories.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn directory_roots(&self) -> &[WatchRoot] {
        &self.directories
    }

    pub fn file_roots(&self) -> &[WatchRoot] {
        &self.files
    }

    /// All roots in registration order: directory roots first, then file
    /// roots not already covered by a recursive directory root.
    pub fn registration_order(&self) -> Vec<&WatchRoot> {
        let mut order: Vec<&WatchRoot> = self.directories.iter().collect();
        order.extend(self.files.iter().filter(|file| {
            !self
                .directories
                .iter()
                .any(|dir| matches!(dir, WatchRoot::Directory { recursive: true, .. }) && dir.contains(file.path()))
        }));
        order
    }

    /// True if `path` (already normalized) falls inside any root.
    pub fn matches(&self, path: &Path) -> bool {
        self.index.matches(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &WatchRoot> {
        self.directories.iter().chain(self.files.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_deduplicates_roots() {
        let mut set = WatchedPathSet::new();
        assert!(set.insert(WatchRoot::file("/proj/a.x")));
        assert!(!set.insert(WatchRoot::file("/proj/a.x")));
        assert!(set.insert(WatchRoot::tree("/proj/src")));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn directory_root_contains_descendants_but_not_siblings() {
        let root = WatchRoot::tree("/proj/src");
        assert!(root.contains(Path::new("/proj/src")));
        assert!(root.contains(Path::new("/proj/src/a/b/c.x")));
        assert!(!root.contains(Path::new("/proj/srcfoo/c.x")));
        assert!(!root.contains(Path::new("/proj")));
    }

    #[test]
    fn shallow_directory_root_only_contains_children() {
        let root = WatchRoot::Directory {
            path: PathBuf::from("/proj/conf"),
            recursive: false,
        };
        assert!(root.contains(Path::new("/proj/conf/app.toml")));
        assert!(!root.contains(Path::new("/proj/conf/nested/app.toml")));
    }

    #[test]
    fn registration_puts_directories_first_and_skips_covered_files() {
        let set: WatchedPathSet = [
            WatchRoot::file("/proj/build.conf"),
            WatchRoot::file("/proj/src/Main.x"),
            WatchRoot::tree("/proj/src"),
        ]
        .into_iter()
        .collect();

        let frozen = set.freeze();
        let order: Vec<&Path> = frozen.registration_order().iter().map(|r| r.path()).collect();
        assert_eq!(order, vec![Path::new("/proj/src"), Path::new("/proj/build.conf")]);
        assert_eq!(frozen.len(), 3);
    }
}
