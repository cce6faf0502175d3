// src/watch/notify_backend.rs

//! Production watcher backend built on `notify`'s recommended watcher.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use notify::event::{AccessKind, AccessMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use tracing::{debug, info, warn};

use crate::errors::WatchError;
use crate::watch::backend::{EventListener, Watcher, WatcherFactory};
use crate::watch::root::{FrozenWatchSet, WatchRoot};

/// Creates [`NotifyWatcher`]s.
#[derive(Debug, Clone, Default)]
pub struct NotifyWatcherFactory;

impl WatcherFactory for NotifyWatcherFactory {
    fn create(&self, listener: EventListener) -> Result<Box<dyn Watcher>, WatchError> {
        // Closure called synchronously by notify on its own thread. It only
        // enqueues, so `stop` can never deadlock against it.
        let inner = RecommendedWatcher::new(
            move |res: notify::Result<Event>| forward_event(&listener, res),
            Config::default(),
        )?;

        Ok(Box::new(NotifyWatcher {
            inner: Mutex::new(Some(inner)),
        }))
    }
}

/// Handle for a live `notify` watcher. Dropping the inner watcher releases
/// every OS watch it holds.
pub struct NotifyWatcher {
    inner: Mutex<Option<RecommendedWatcher>>,
}

impl std::fmt::Debug for NotifyWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyWatcher").finish()
    }
}

impl Watcher for NotifyWatcher {
    fn watch(&self, roots: &FrozenWatchSet) -> Result<(), WatchError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| WatchError::Backend("watcher mutex poisoned".to_string()))?;
        let watcher = guard
            .as_mut()
            .ok_or_else(|| WatchError::Backend("watcher already stopped".to_string()))?;

        let plan = registration_plan(roots);
        for (path, mode) in &plan {
            debug!(?path, ?mode, "registering watch");
            watcher.watch(path, *mode)?;
        }

        info!(registrations = plan.len(), roots = roots.len(), "file watcher armed");
        Ok(())
    }

    fn stop(&self) {
        let taken = match self.inner.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if taken.is_some() {
            debug!("released notify watcher");
        }
    }
}

/// Turn the frozen roots into concrete `notify` registrations.
///
/// Directory roots are registered first. File roots are watched through their
/// nearest existing parent directory, which keeps working when editors
/// replace files by rename and when the file does not exist yet. That parent
/// is watched recursively when intermediate directories are missing, so their
/// later creation is seen. Parents already covered by a recursive
/// registration are skipped.
pub fn registration_plan(roots: &FrozenWatchSet) -> Vec<(PathBuf, RecursiveMode)> {
    let mut plan: Vec<(PathBuf, RecursiveMode)> = Vec::new();
    let mut recursive_dirs: Vec<&Path> = Vec::new();

    for root in roots.directory_roots() {
        if let WatchRoot::Directory { path, recursive } = root {
            let mode = if *recursive {
                recursive_dirs.push(path);
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            plan.push((path.clone(), mode));
        }
    }

    let mut parents: BTreeMap<PathBuf, RecursiveMode> = BTreeMap::new();
    for root in roots.registration_order() {
        if let WatchRoot::File(path) = root {
            let Some(parent) = nearest_existing_dir(path) else {
                warn!(?path, "no existing ancestor to watch for file input");
                continue;
            };
            if recursive_dirs.iter().any(|dir| parent.starts_with(dir)) {
                continue;
            }
            let mode = if path.parent() == Some(parent.as_path()) {
                RecursiveMode::NonRecursive
            } else {
                debug!(?path, ?parent, "file input has missing parents; watching ancestor recursively");
                RecursiveMode::Recursive
            };
            let entry = parents.entry(parent).or_insert(mode);
            if mode == RecursiveMode::Recursive {
                *entry = RecursiveMode::Recursive;
            }
        }
    }

    let recursive_parents: Vec<PathBuf> = parents
        .iter()
        .filter(|(_, mode)| **mode == RecursiveMode::Recursive)
        .map(|(path, _)| path.clone())
        .collect();
    plan.extend(parents.into_iter().filter(|(path, _)| {
        !recursive_parents
            .iter()
            .any(|dir| path != dir && path.starts_with(dir))
    }));
    plan
}

fn nearest_existing_dir(path: &Path) -> Option<PathBuf> {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir.is_dir() {
            return Some(dir.to_path_buf());
        }
        current = dir.parent();
    }
    None
}

/// Map one `notify` callback result onto listener calls.
pub fn forward_event(listener: &EventListener, res: notify::Result<Event>) {
    let event = match res {
        Ok(event) => event,
        Err(err) => {
            listener.on_error(err.to_string());
            return;
        }
    };

    if event.need_rescan() {
        listener.on_overflow();
        return;
    }

    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => {
            for path in event.paths {
                listener.on_change(path);
            }
        }
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => {
            for path in event.paths {
                listener.on_change(path);
            }
        }
        // Reads do not change anything.
        EventKind::Access(_) => {}
        EventKind::Any | EventKind::Other => {
            if event.paths.is_empty() {
                listener.on_undefined(None);
            }
            for path in event.paths {
                listener.on_undefined(Some(path));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::backend::event_channel;
    use crate::watch::event::RawEvent;
    use crate::watch::root::WatchedPathSet;
    use notify::event::{CreateKind, Flag, ModifyKind};

    #[tokio::test]
    async fn notify_events_map_to_raw_events() {
        let (listener, mut stream) = event_channel(16);

        forward_event(
            &listener,
            Ok(Event::new(EventKind::Create(CreateKind::File)).add_path("/p/a".into())),
        );
        forward_event(
            &listener,
            Ok(Event::new(EventKind::Access(AccessKind::Read)).add_path("/p/b".into())),
        );
        forward_event(
            &listener,
            Ok(Event::new(EventKind::Modify(ModifyKind::Any)).set_flag(Flag::Rescan)),
        );
        forward_event(&listener, Ok(Event::new(EventKind::Other)));
        forward_event(&listener, Err(notify::Error::generic("boom")));
        drop(listener);

        assert_eq!(stream.next().await, Some(RawEvent::change("/p/a")));
        assert_eq!(stream.next().await, Some(RawEvent::overflow()));
        assert_eq!(stream.next().await, Some(RawEvent::undefined(None)));
        let failure = stream.next().await.unwrap();
        assert!(failure.error.unwrap().contains("boom"));
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn plan_skips_file_parents_inside_recursive_roots() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(base.join("src/pkg")).unwrap();
        std::fs::create_dir_all(base.join("conf")).unwrap();

        let set: WatchedPathSet = [
            WatchRoot::tree(base.join("src")),
            WatchRoot::file(base.join("src/pkg/Main.x")),
            WatchRoot::file(base.join("conf/app.toml")),
        ]
        .into_iter()
        .collect();

        let plan = registration_plan(&set.freeze());
        assert_eq!(
            plan,
            vec![
                (base.join("src"), RecursiveMode::Recursive),
                (base.join("conf"), RecursiveMode::NonRecursive),
            ]
        );
    }

    #[test]
    fn missing_parents_are_watched_through_recursive_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().canonicalize().unwrap();
        std::fs::create_dir_all(base.join("conf/local")).unwrap();

        let set: WatchedPathSet = [
            WatchRoot::file(base.join("conf/app.toml")),
            WatchRoot::file(base.join("conf/local/site.toml")),
            WatchRoot::file(base.join("conf/missing/deep/x.toml")),
        ]
        .into_iter()
        .collect();

        let plan = registration_plan(&set.freeze());
        assert_eq!(plan, vec![(base.join("conf"), RecursiveMode::Recursive)]);
    }
}
