// src/errors.rs

//! Crate-wide error aliases and helpers.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::SessionPhase;

#[derive(Error, Debug)]
pub enum BuildwatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Watch(#[from] WatchError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure reported by a watcher backend while creating a watch session or
/// registering roots with it.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The OS ran out of watch handles (e.g. inotify `max_user_watches`).
    #[error("file watch resources exhausted: {0}")]
    ResourcesExhausted(String),

    #[error("cannot watch {path:?}: {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    #[error("file watch IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file watch backend error: {0}")]
    Backend(String),
}

impl From<notify::Error> for WatchError {
    fn from(err: notify::Error) -> Self {
        let path = err.paths.first().cloned().unwrap_or_default();
        match err.kind {
            notify::ErrorKind::MaxFilesWatch => {
                WatchError::ResourcesExhausted("too many watched paths".to_string())
            }
            notify::ErrorKind::PathNotFound => WatchError::InvalidPath {
                path,
                reason: "path not found".to_string(),
            },
            notify::ErrorKind::Io(io) => WatchError::Io(io),
            notify::ErrorKind::Generic(msg) => WatchError::Backend(msg),
            other => WatchError::Backend(format!("{other:?}")),
        }
    }
}

/// A lifecycle hook was called in a phase that does not accept it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("`{operation}` is not valid while the watch session is {phase:?}")]
    InvalidTransition {
        operation: &'static str,
        phase: SessionPhase,
    },

    #[error("watch session has been shut down")]
    ShutDown,
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildwatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_max_files_maps_to_resources_exhausted() {
        let err = notify::Error::new(notify::ErrorKind::MaxFilesWatch);
        let mapped = WatchError::from(err);
        assert!(matches!(mapped, WatchError::ResourcesExhausted(_)));
        assert!(mapped.to_string().contains("exhausted"));
    }

    #[test]
    fn notify_path_not_found_keeps_the_path() {
        let err = notify::Error::path_not_found().add_path(PathBuf::from("/nope"));
        match WatchError::from(err) {
            WatchError::InvalidPath { path, .. } => assert_eq!(path, PathBuf::from("/nope")),
            other => panic!("unexpected mapping: {other:?}"),
        }
    }
}
