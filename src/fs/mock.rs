// src/fs/mock.rs

use super::FileSystem;
use crate::watch::path_utils::normalize_lexically;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File,
    Dir(Vec<String>), // List of child names
}

/// In-memory filesystem for tests.
///
/// Paths are expected to be absolute. Symlinks are modelled as aliases: a
/// link path maps to a target directory and is resolved component-wise by
/// [`FileSystem::canonicalize`].
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
    links: Arc<Mutex<HashMap<PathBuf, PathBuf>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        files.insert(PathBuf::from("/"), MockEntry::Dir(Vec::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
            links: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref().to_path_buf();
        let mut files = self.files.lock().unwrap();
        files.insert(path.clone(), MockEntry::File);

        if let Some(parent) = path.parent() {
            Self::ensure_dir_entry(&mut files, parent);
            Self::link_child(&mut files, parent, &path);
        }
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut files = self.files.lock().unwrap();
        Self::ensure_dir_entry(&mut files, path.as_ref());
    }

    /// Register `link` as a symlink pointing at `target`.
    ///
    /// The link itself also shows up as an existing entry so that
    /// `exists(link)` behaves like the real filesystem.
    pub fn add_symlink(&self, link: impl AsRef<Path>, target: impl AsRef<Path>) {
        let link = link.as_ref().to_path_buf();
        {
            let mut files = self.files.lock().unwrap();
            Self::ensure_dir_entry(&mut files, &link);
        }
        self.links
            .lock()
            .unwrap()
            .insert(link, target.as_ref().to_path_buf());
    }

    fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if files.contains_key(path) {
            return;
        }
        files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        if let Some(parent) = path.parent() {
            if parent != path {
                Self::ensure_dir_entry(files, parent);
                Self::link_child(files, parent, path);
            }
        }
    }

    fn link_child(files: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
        if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
            if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
                if !children.iter().any(|c| c == name) {
                    children.push(name.to_string());
                }
            }
        }
    }

    fn resolve_links(&self, path: &Path) -> PathBuf {
        let links = self.links.lock().unwrap();
        let mut resolved = PathBuf::new();
        for component in normalize_lexically(path).components() {
            resolved.push(component);
            if let Some(target) = links.get(&resolved) {
                resolved = target.clone();
            }
        }
        resolved
    }
}

impl FileSystem for MockFileSystem {
    fn exists(&self, path: &Path) -> bool {
        let resolved = self.resolve_links(path);
        let files = self.files.lock().unwrap();
        files.contains_key(&resolved)
    }

    fn is_file(&self, path: &Path) -> bool {
        let resolved = self.resolve_links(path);
        let files = self.files.lock().unwrap();
        matches!(files.get(&resolved), Some(MockEntry::File))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let resolved = self.resolve_links(path);
        let files = self.files.lock().unwrap();
        matches!(files.get(&resolved), Some(MockEntry::Dir(_)))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let resolved = self.resolve_links(path);
        let files = self.files.lock().unwrap();
        if files.contains_key(&resolved) {
            Ok(resolved)
        } else {
            Err(anyhow!("No such file or directory: {:?}", path))
        }
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let resolved = self.resolve_links(path);
        let files = self.files.lock().unwrap();
        match files.get(&resolved) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symlinked_directory_canonicalizes_to_target() {
        let fs = MockFileSystem::new();
        fs.add_file("/real/proj/src/Main.x");
        fs.add_symlink("/proj", "/real/proj");

        assert!(fs.exists(Path::new("/proj/src/Main.x")));
        assert_eq!(
            fs.canonicalize(Path::new("/proj/src/Main.x")).unwrap(),
            PathBuf::from("/real/proj/src/Main.x")
        );
    }

    #[test]
    fn missing_path_fails_to_canonicalize() {
        let fs = MockFileSystem::new();
        fs.add_dir("/proj");
        assert!(fs.canonicalize(Path::new("/proj/missing")).is_err());
        assert!(!fs.exists(Path::new("/proj/missing")));
    }
}
