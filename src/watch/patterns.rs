// src/watch/patterns.rs

//! Resolution of configured task inputs into concrete paths.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::trace;

use crate::fs::FileSystem;
use crate::watch::collector::TaskInputs;

/// Compiled input declaration for one task.
///
/// - `dirs` are directory trees, watched as a whole.
/// - `files` are literal paths or glob patterns relative to the project root;
///   globs are expanded against the filesystem at the start of every build so
///   newly created matches are picked up.
/// - `exclude` removes matches from the `files` expansion.
#[derive(Clone)]
pub struct InputSpec {
    dirs: Vec<String>,
    literal_files: Vec<String>,
    globs: Vec<(PathBuf, GlobSet)>,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for InputSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSpec")
            .field("dirs", &self.dirs)
            .field("literal_files", &self.literal_files)
            .field("globs", &self.globs.len())
            .finish_non_exhaustive()
    }
}

impl InputSpec {
    pub fn compile(dirs: &[String], files: &[String], exclude: &[String]) -> Result<Self> {
        let mut literal_files = Vec::new();
        let mut globs = Vec::new();

        for pattern in files {
            if is_glob(pattern) {
                let set = build_globset(std::slice::from_ref(pattern))?;
                globs.push((glob_base(pattern), set));
            } else {
                literal_files.push(pattern.clone());
            }
        }

        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(build_globset(exclude).context("building exclude globset")?)
        };

        Ok(Self {
            dirs: dirs.to_vec(),
            literal_files,
            globs,
            exclude_set,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty() && self.literal_files.is_empty() && self.globs.is_empty()
    }

    /// Resolve against `project_root` using `fs`.
    pub fn resolve(&self, fs: &dyn FileSystem, project_root: &Path) -> Result<TaskInputs> {
        let mut inputs = TaskInputs::new();

        for dir in &self.dirs {
            inputs.trees.push(project_root.join(dir));
        }

        for file in &self.literal_files {
            if !self.is_excluded(file) {
                inputs.files.push(project_root.join(file));
            }
        }

        for (base, set) in &self.globs {
            let start = project_root.join(base);
            if !fs.is_dir(&start) {
                continue;
            }
            for path in walk_files(fs, &start)? {
                let Ok(rel) = path.strip_prefix(project_root) else {
                    continue;
                };
                let rel_str = rel.to_string_lossy().replace('\\', "/");
                if set.is_match(&rel_str) && !self.is_excluded(&rel_str) {
                    inputs.files.push(path);
                }
            }
        }

        inputs.files.sort();
        inputs.files.dedup();
        Ok(inputs)
    }

    fn is_excluded(&self, rel: &str) -> bool {
        self.exclude_set
            .as_ref()
            .map(|set| set.is_match(rel))
            .unwrap_or(false)
    }
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Longest leading run of literal path components in a glob pattern.
fn glob_base(pattern: &str) -> PathBuf {
    pattern
        .split('/')
        .take_while(|segment| !is_glob(segment))
        .collect()
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Collect every file below `root`. Each directory is entered once, keyed by
/// its canonical path, so symlink cycles terminate.
fn walk_files(fs: &dyn FileSystem, root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let Ok(canonical) = fs.canonicalize(&dir) else {
            trace!(?dir, "cannot canonicalize directory; skipping");
            continue;
        };
        if !visited.insert(canonical) {
            trace!(?dir, "directory already walked; skipping");
            continue;
        }
        for path in fs.read_dir(&dir)? {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn glob_base_stops_at_first_wildcard() {
        assert_eq!(glob_base("src/**/*.x"), PathBuf::from("src"));
        assert_eq!(glob_base("*.toml"), PathBuf::new());
        assert_eq!(glob_base("a/b/c?.x"), PathBuf::from("a/b"));
    }

    #[test]
    fn resolves_dirs_literals_and_globs() {
        let fs = MockFileSystem::new();
        fs.add_file("/proj/src/Main.x");
        fs.add_file("/proj/src/util/Util.x");
        fs.add_file("/proj/src/util/Util_tmp.x");
        fs.add_file("/proj/src/notes.md");

        let spec = InputSpec::compile(
            &strings(&["assets"]),
            &strings(&["project.conf", "src/**/*.x"]),
            &strings(&["**/*_tmp.x"]),
        )
        .unwrap();

        let inputs = spec.resolve(&fs, Path::new("/proj")).unwrap();
        assert_eq!(inputs.trees, vec![PathBuf::from("/proj/assets")]);
        assert_eq!(
            inputs.files,
            vec![
                PathBuf::from("/proj/project.conf"),
                PathBuf::from("/proj/src/Main.x"),
                PathBuf::from("/proj/src/util/Util.x"),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlink_cycles_under_glob_base_terminate() -> Result<()> {
        use crate::fs::RealFileSystem;
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir()?;
        let root = RealFileSystem.canonicalize(dir.path())?;
        std::fs::create_dir_all(root.join("src/nested"))?;
        std::fs::write(root.join("src/Main.x"), "")?;
        std::fs::write(root.join("src/nested/Util.x"), "")?;
        symlink(".", root.join("src/a"))?;
        symlink(".", root.join("src/b"))?;
        symlink("..", root.join("src/nested/up"))?;

        let spec = InputSpec::compile(&[], &strings(&["src/**/*.x"]), &[])?;
        let inputs = spec.resolve(&RealFileSystem, &root)?;

        assert_eq!(inputs.files.len(), 2);
        assert!(inputs.files.contains(&root.join("src/Main.x")));
        assert!(inputs.files.contains(&root.join("src/nested/Util.x")));
        Ok(())
    }

    #[test]
    fn invalid_glob_is_reported() {
        let err = InputSpec::compile(&[], &strings(&["src/[*.x"]), &[]).unwrap_err();
        assert!(format!("{err:#}").contains("invalid glob pattern"));
    }
}
