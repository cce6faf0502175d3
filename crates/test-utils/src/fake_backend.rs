use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use buildwatch::errors::WatchError;
use buildwatch::watch::{EventListener, FrozenWatchSet, WatchRoot, Watcher, WatcherFactory};

/// One call observed by the fake backend. `id` identifies the watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Created(usize),
    Watched { id: usize, roots: Vec<WatchRoot> },
    Stopped(usize),
}

/// Which backend step should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFailure {
    None,
    Create,
    Watch,
}

#[derive(Debug)]
struct Shared {
    calls: Mutex<Vec<BackendCall>>,
    listeners: Mutex<Vec<EventListener>>,
    failure: Mutex<InjectedFailure>,
    next_id: AtomicUsize,
}

/// A fake watcher backend that:
/// - records every create / watch / stop call in order
/// - keeps the listener of each watcher so tests can inject events
/// - can be told to fail creation or registration
#[derive(Debug, Clone)]
pub struct FakeWatcherFactory {
    shared: Arc<Shared>,
}

impl FakeWatcherFactory {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                calls: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
                failure: Mutex::new(InjectedFailure::None),
                next_id: AtomicUsize::new(0),
            }),
        }
    }

    pub fn fail_with(&self, failure: InjectedFailure) {
        *self.shared.failure.lock().unwrap() = failure;
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub fn created(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::Created(_)))
    }

    pub fn stopped(&self) -> usize {
        self.count(|c| matches!(c, BackendCall::Stopped(_)))
    }

    /// Roots registered with the most recent watcher.
    pub fn last_watched(&self) -> Option<Vec<WatchRoot>> {
        self.calls().into_iter().rev().find_map(|c| match c {
            BackendCall::Watched { roots, .. } => Some(roots),
            _ => None,
        })
    }

    /// Listener of the most recently created watcher.
    pub fn listener(&self) -> EventListener {
        self.shared
            .listeners
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no watcher has been created")
    }

    fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.shared.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: BackendCall) {
        self.shared.calls.lock().unwrap().push(call);
    }
}

impl Default for FakeWatcherFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl WatcherFactory for FakeWatcherFactory {
    fn create(&self, listener: EventListener) -> Result<Box<dyn Watcher>, WatchError> {
        if *self.shared.failure.lock().unwrap() == InjectedFailure::Create {
            return Err(WatchError::ResourcesExhausted(
                "injected create failure".to_string(),
            ));
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        self.record(BackendCall::Created(id));
        self.shared.listeners.lock().unwrap().push(listener);

        Ok(Box::new(FakeWatcher {
            id,
            factory: self.clone(),
        }))
    }
}

struct FakeWatcher {
    id: usize,
    factory: FakeWatcherFactory,
}

impl Watcher for FakeWatcher {
    fn watch(&self, roots: &FrozenWatchSet) -> Result<(), WatchError> {
        if *self.factory.shared.failure.lock().unwrap() == InjectedFailure::Watch {
            return Err(WatchError::Backend("injected watch failure".to_string()));
        }
        self.factory.record(BackendCall::Watched {
            id: self.id,
            roots: roots.registration_order().into_iter().cloned().collect(),
        });
        Ok(())
    }

    fn stop(&self) {
        self.factory.record(BackendCall::Stopped(self.id));
    }
}
