// src/engine/session.rs

//! Watch session state machine.
//!
//! One [`WatchSession`] lives for the whole continuous run and is driven by
//! the build lifecycle hooks:
//!
//! ```text
//! Idle --build_started--> Collecting --task_executed--> Collecting
//! Collecting --build_finished--> Armed --build_started--> Collecting
//! any --shutdown--> Stopped
//! ```
//!
//! The session exclusively owns the live watcher. The debouncer spawned for
//! an armed session only holds a stop handle to it.
//!
//! The hooks themselves are synchronous and may be called from any thread.
//! The debouncer runs on the tokio runtime captured by [`WatchSession::new`]
//! or supplied through [`WatchSession::with_runtime`].

use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::engine::{Trigger, TriggerSink};
use crate::errors::SessionError;
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::{
    event_channel, ActiveWatcher, DebounceConfig, Debouncer, EventFilter, FireGuard,
    FrozenWatchSet, InputCollector, TaskInputs, WatchedPathSet, WatcherFactory,
};

/// Default capacity of the channel between backend callbacks and the
/// debouncer.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Reason carried by the stop trigger when a build declared no inputs.
pub const NO_INPUTS_REASON: &str = "no file system inputs to watch";

/// Reason carried by the stop trigger when no runtime can host the debouncer.
pub const NO_RUNTIME_REASON: &str = "error no tokio runtime available for the file watcher";

/// Public view of the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Collecting,
    Armed,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub debounce: DebounceConfig,
    pub event_queue_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            debounce: DebounceConfig::default(),
            event_queue_capacity: DEFAULT_EVENT_QUEUE_CAPACITY,
        }
    }
}

/// Everything that belongs to one armed iteration.
#[derive(Debug)]
struct ArmedWatch {
    roots: Arc<FrozenWatchSet>,
    guard: FireGuard,
    watcher: Option<Arc<ActiveWatcher>>,
    consumer: Option<JoinHandle<()>>,
}

impl ArmedWatch {
    /// Suppress any unfired trigger and release the watcher. Blocks until the
    /// backend has stopped.
    fn disarm(self) {
        self.guard.cancel();
        if let Some(consumer) = self.consumer {
            consumer.abort();
        }
        if let Some(watcher) = self.watcher {
            watcher.stop();
        }
    }
}

#[derive(Debug)]
enum SessionState {
    Idle,
    Collecting(InputCollector),
    Armed(ArmedWatch),
    Stopped,
}

impl SessionState {
    fn phase(&self) -> SessionPhase {
        match self {
            SessionState::Idle => SessionPhase::Idle,
            SessionState::Collecting(_) => SessionPhase::Collecting,
            SessionState::Armed(_) => SessionPhase::Armed,
            SessionState::Stopped => SessionPhase::Stopped,
        }
    }
}

pub struct WatchSession {
    state: SessionState,
    factory: Arc<dyn WatcherFactory>,
    fs: Arc<dyn FileSystem>,
    sink: Arc<dyn TriggerSink>,
    options: SessionOptions,
    runtime: Option<Handle>,
}

impl std::fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("state", &self.state)
            .field("options", &self.options)
            .field("has_runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    /// Create an idle session. When called inside a tokio runtime, that
    /// runtime hosts the debouncer of every armed iteration.
    pub fn new(
        factory: Arc<dyn WatcherFactory>,
        sink: Arc<dyn TriggerSink>,
        options: SessionOptions,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            factory,
            fs: Arc::new(RealFileSystem),
            sink,
            options,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Spawn debouncers on `runtime`, so the lifecycle hooks can be driven
    /// from threads outside it.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Use a different filesystem for input canonicalization.
    pub fn with_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Roots collected so far in the current iteration.
    pub fn pending_roots(&self) -> Option<&WatchedPathSet> {
        match &self.state {
            SessionState::Collecting(collector) => Some(collector.pending()),
            _ => None,
        }
    }

    /// Roots frozen for the armed session.
    pub fn armed_roots(&self) -> Option<Arc<FrozenWatchSet>> {
        match &self.state {
            SessionState::Armed(armed) => Some(Arc::clone(&armed.roots)),
            _ => None,
        }
    }

    /// True while a backend watcher is registered and not yet stopped.
    pub fn has_active_watcher(&self) -> bool {
        match &self.state {
            SessionState::Armed(ArmedWatch {
                watcher: Some(watcher),
                ..
            }) => !watcher.is_stopped(),
            _ => false,
        }
    }

    /// True once the armed session has emitted its trigger.
    pub fn has_fired(&self) -> bool {
        match &self.state {
            SessionState::Armed(armed) => armed.guard.has_fired(),
            _ => false,
        }
    }

    /// Start a new iteration: release any live watcher and reset the
    /// collected roots.
    pub fn build_started(&mut self) -> Result<(), SessionError> {
        let previous = std::mem::replace(&mut self.state, SessionState::Idle);
        match previous {
            SessionState::Stopped => {
                self.state = SessionState::Stopped;
                return Err(SessionError::ShutDown);
            }
            SessionState::Armed(armed) => {
                debug!(fired = armed.guard.has_fired(), "discarding armed session");
                armed.disarm();
            }
            SessionState::Collecting(collector) => {
                debug!(
                    discarded = collector.pending().len(),
                    "build restarted before finishing; dropping collected roots"
                );
            }
            SessionState::Idle => {}
        }

        self.state = SessionState::Collecting(InputCollector::new(Arc::clone(&self.fs)));
        debug!("watch session collecting inputs");
        Ok(())
    }

    /// Record the inputs of a task that is about to run (or has run).
    pub fn task_executed(
        &mut self,
        task: &str,
        inputs: &TaskInputs,
        output_root: &Path,
    ) -> Result<(), SessionError> {
        match &mut self.state {
            SessionState::Collecting(collector) => {
                let summary = collector.append_task_inputs(inputs, output_root);
                debug!(
                    task,
                    added = summary.added,
                    excluded = summary.excluded,
                    "task inputs recorded"
                );
                Ok(())
            }
            other => Err(invalid("task_executed", other.phase())),
        }
    }

    /// Freeze the collected roots and arm a new watcher.
    ///
    /// Backend failures do not surface here: they become a `Stop` trigger and
    /// the session is left armed with nothing to watch.
    pub fn build_finished(&mut self) -> Result<(), SessionError> {
        let collector = match std::mem::replace(&mut self.state, SessionState::Idle) {
            SessionState::Collecting(collector) => collector,
            other => {
                let phase = other.phase();
                self.state = other;
                return Err(invalid("build_finished", phase));
            }
        };

        let roots = Arc::new(collector.into_watched().freeze());
        self.state = SessionState::Armed(self.arm(roots));
        Ok(())
    }

    fn arm(&self, roots: Arc<FrozenWatchSet>) -> ArmedWatch {
        let guard = FireGuard::new();
        let mut armed = ArmedWatch {
            roots: Arc::clone(&roots),
            guard: guard.clone(),
            watcher: None,
            consumer: None,
        };

        if roots.is_empty() {
            warn!("build declared no file system inputs; leaving continuous mode");
            guard.fire(self.sink.as_ref(), Trigger::stop(NO_INPUTS_REASON));
            return armed;
        }

        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            warn!("no tokio runtime to run the debouncer on; leaving continuous mode");
            guard.fire(self.sink.as_ref(), Trigger::stop(NO_RUNTIME_REASON));
            return armed;
        };

        let (listener, events) = event_channel(self.options.event_queue_capacity);

        let watcher = match self.factory.create(listener) {
            Ok(inner) => Arc::new(ActiveWatcher::new(inner)),
            Err(err) => {
                warn!(error = %err, "failed to create file watcher");
                guard.fire(self.sink.as_ref(), Trigger::stop(format!("error {err}")));
                return armed;
            }
        };

        if let Err(err) = watcher.watch(&roots) {
            warn!(error = %err, "failed to register file watches");
            watcher.stop();
            guard.fire(self.sink.as_ref(), Trigger::stop(format!("error {err}")));
            return armed;
        }

        let filter = EventFilter::new(Arc::clone(&roots)).with_canonicalization(Arc::clone(&self.fs));
        let debouncer = Debouncer::new(
            self.options.debounce,
            guard,
            Arc::clone(&watcher),
            Arc::clone(&self.sink),
        );

        armed.consumer = Some(runtime.spawn(debouncer.run(filter, events)));
        armed.watcher = Some(watcher);
        info!(roots = roots.len(), "watching for changes");
        armed
    }

    /// Stop everything. The session accepts no further lifecycle calls.
    pub fn shutdown(&mut self) {
        match std::mem::replace(&mut self.state, SessionState::Stopped) {
            SessionState::Armed(armed) => armed.disarm(),
            SessionState::Stopped => return,
            SessionState::Idle | SessionState::Collecting(_) => {}
        }
        info!("watch session shut down");
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn invalid(operation: &'static str, phase: SessionPhase) -> SessionError {
    if phase == SessionPhase::Stopped {
        SessionError::ShutDown
    } else {
        SessionError::InvalidTransition { operation, phase }
    }
}
