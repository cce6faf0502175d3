// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Component, Path, PathBuf};

use crate::fs::FileSystem;

/// Lexically clean a path: drop `.` components and fold `..` into the
/// preceding component. Does not touch the filesystem.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // `..` at the root stays at the root.
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other),
        }
    }
    out
}

/// Canonicalize `path` if it exists, otherwise return its lexical form.
pub fn canonicalize_if_exists(fs: &dyn FileSystem, path: &Path) -> PathBuf {
    if fs.exists(path) {
        if let Ok(canonical) = fs.canonicalize(path) {
            return canonical;
        }
    }
    normalize_lexically(path)
}

/// Resolve symlinks in the longest existing prefix of `path` and re-attach
/// the missing tail.
///
/// This is the form used for watch roots: a declared input that does not
/// exist yet still lands under the same canonical directory the backend will
/// report events for.
pub fn resolve_existing_prefix(fs: &dyn FileSystem, path: &Path) -> PathBuf {
    let normalized = normalize_lexically(path);
    let mut tail: Vec<std::ffi::OsString> = Vec::new();
    let mut current = normalized.as_path();

    loop {
        if fs.exists(current) {
            if let Ok(mut canonical) = fs.canonicalize(current) {
                for part in tail.iter().rev() {
                    canonical.push(part);
                }
                return canonical;
            }
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                current = parent;
            }
            _ => return normalized,
        }
    }
}

/// Return true if `path`, or any of its ancestors, is `root`.
///
/// `root` must exist and already be in canonical form. Each step up the ancestor chain
/// is canonicalized when it exists on disk; steps that do not exist are
/// compared in their lexical form, so they can only match `root` literally.
pub fn is_same_or_child_of(fs: &dyn FileSystem, root: &Path, path: &Path) -> bool {
    let normalized = normalize_lexically(path);
    let mut current = Some(normalized.as_path());

    while let Some(candidate) = current {
        if canonicalize_if_exists(fs, candidate) == root {
            return true;
        }
        current = candidate.parent();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn normalize_folds_dot_and_dotdot() {
        assert_eq!(
            normalize_lexically(Path::new("/proj/./src/../build/x")),
            PathBuf::from("/proj/build/x")
        );
        assert_eq!(normalize_lexically(Path::new("/../a")), PathBuf::from("/a"));
    }

    #[test]
    fn missing_tail_is_reattached_to_canonical_prefix() {
        let fs = MockFileSystem::new();
        fs.add_dir("/real/proj/src");
        fs.add_symlink("/proj", "/real/proj");

        assert_eq!(
            resolve_existing_prefix(&fs, Path::new("/proj/src/gen/New.x")),
            PathBuf::from("/real/proj/src/gen/New.x")
        );
    }

    #[test]
    fn child_detection_sees_through_symlinks() {
        let fs = MockFileSystem::new();
        fs.add_dir("/proj");
        fs.add_symlink("/proj/link", "/real/out");
        fs.add_file("/real/out/a.x");

        assert!(is_same_or_child_of(&fs, Path::new("/real/out"), Path::new("/proj/link/a.x")));
        assert!(!is_same_or_child_of(&fs, Path::new("/real/out"), Path::new("/proj/other.x")));
    }

    #[test]
    fn missing_ancestors_only_match_literally() {
        let fs = MockFileSystem::new();
        fs.add_dir("/proj/build");

        assert!(is_same_or_child_of(
            &fs,
            Path::new("/proj/build"),
            Path::new("/proj/build/generated/Gen.x")
        ));
        assert!(!is_same_or_child_of(
            &fs,
            Path::new("/proj/build"),
            Path::new("/proj/buildish/Gen.x")
        ));
    }
}
