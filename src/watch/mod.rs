// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Turning task inputs into canonical watch roots, minus build outputs.
//! - Defining the watcher backend contract and a `notify`-based backend.
//! - Filtering raw backend events against the frozen watch set.
//! - Debouncing relevant events into exactly one trigger per session.
//!
//! It does **not** know about build iterations; the lifecycle that ties these
//! pieces together lives in [`crate::engine::session`].

pub mod backend;
pub mod collector;
pub mod debounce;
pub mod event;
pub mod filter;
pub mod index;
pub mod notify_backend;
pub mod path_utils;
pub mod patterns;
pub mod root;

pub use backend::{event_channel, ActiveWatcher, EventListener, EventStream, Watcher, WatcherFactory};
pub use collector::{AppendSummary, InputCollector, TaskInputs};
pub use debounce::{DebounceConfig, Debouncer, FireGuard};
pub use event::{RawEvent, RawEventKind};
pub use filter::{Cause, EventFilter, Relevance};
pub use notify_backend::{NotifyWatcher, NotifyWatcherFactory};
pub use patterns::InputSpec;
pub use root::{FrozenWatchSet, WatchRoot, WatchedPathSet};
