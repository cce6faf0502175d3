// src/watch/backend.rs

//! Pluggable watcher backend abstraction.
//!
//! The watch session talks to a [`WatcherFactory`] instead of a concrete OS
//! watcher. Production code uses [`crate::watch::NotifyWatcherFactory`];
//! tests provide a fake that records calls and injects events by hand.
//!
//! Backends deliver events through an [`EventListener`], which only ever
//! enqueues onto a bounded channel. A single consumer drains the matching
//! [`EventStream`], so filtering and debouncing never run concurrently.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

use crate::errors::WatchError;
use crate::watch::event::RawEvent;
use crate::watch::root::FrozenWatchSet;

/// A native watch session.
pub trait Watcher: Send + Sync {
    /// Register every root of `roots`. May be called once per watcher.
    fn watch(&self, roots: &FrozenWatchSet) -> Result<(), WatchError>;

    /// Release all OS resources. Must be idempotent and must not wait on the
    /// backend's own callback thread.
    fn stop(&self);
}

/// Creates watchers wired to a listener.
pub trait WatcherFactory: Send + Sync {
    fn create(&self, listener: EventListener) -> Result<Box<dyn Watcher>, WatchError>;
}

/// Backend-facing half of the event channel.
///
/// Cheap to clone; every method is non-blocking and callable from any thread.
#[derive(Debug, Clone)]
pub struct EventListener {
    tx: mpsc::Sender<RawEvent>,
    lost: Arc<AtomicBool>,
}

impl EventListener {
    pub fn on_change(&self, path: impl Into<PathBuf>) {
        self.emit(RawEvent::change(path));
    }

    pub fn on_overflow(&self) {
        self.emit(RawEvent::overflow());
    }

    pub fn on_undefined(&self, path: Option<PathBuf>) {
        self.emit(RawEvent::undefined(path));
    }

    pub fn on_error(&self, message: impl Into<String>) {
        self.emit(RawEvent::failure(message));
    }

    pub fn emit(&self, event: RawEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                // Dropped events are reported to the consumer as an overflow.
                self.lost.store(true, Ordering::SeqCst);
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// True once the consuming side has gone away (session fired or reset).
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer-facing half of the event channel.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<RawEvent>,
    lost: Arc<AtomicBool>,
}

impl EventStream {
    /// Next event, or `None` once every listener has been dropped.
    ///
    /// If the channel overflowed since the last call, a synthetic overflow
    /// event is returned first.
    pub async fn next(&mut self) -> Option<RawEvent> {
        if self.lost.swap(false, Ordering::SeqCst) {
            return Some(RawEvent::overflow());
        }
        match self.rx.recv().await {
            Some(event) => Some(event),
            None if self.lost.swap(false, Ordering::SeqCst) => Some(RawEvent::overflow()),
            None => None,
        }
    }
}

/// Create a bounded event channel. `capacity` is clamped to at least 1.
pub fn event_channel(capacity: usize) -> (EventListener, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let lost = Arc::new(AtomicBool::new(false));
    (
        EventListener {
            tx,
            lost: Arc::clone(&lost),
        },
        EventStream { rx, lost },
    )
}

/// The single live watcher owned by a watch session.
///
/// Wraps a backend watcher so that `stop` reaches the backend exactly once,
/// and so that a second caller blocks until the first stop has finished.
pub struct ActiveWatcher {
    inner: Box<dyn Watcher>,
    stopped: Mutex<bool>,
}

impl std::fmt::Debug for ActiveWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveWatcher")
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl ActiveWatcher {
    pub fn new(inner: Box<dyn Watcher>) -> Self {
        Self {
            inner,
            stopped: Mutex::new(false),
        }
    }

    pub fn watch(&self, roots: &FrozenWatchSet) -> Result<(), WatchError> {
        self.inner.watch(roots)
    }

    pub fn stop(&self) {
        let mut stopped = match self.stopped.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("watcher stop mutex poisoned; continuing");
                poisoned.into_inner()
            }
        };
        if *stopped {
            return;
        }
        self.inner.stop();
        *stopped = true;
        debug!("watcher stopped");
    }

    pub fn is_stopped(&self) -> bool {
        match self.stopped.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}
