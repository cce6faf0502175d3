// tests/debounce_concurrency.rs

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;

use buildwatch::engine::{
    ChannelTriggerSink, SessionOptions, Trigger, TriggerKind, WatchSession,
};
use buildwatch::fs::mock::MockFileSystem;
use buildwatch::watch::{DebounceConfig, TaskInputs};
use buildwatch_test_utils::builders::session_options;
use buildwatch_test_utils::fake_backend::FakeWatcherFactory;
use buildwatch_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

fn armed_session(
    options: SessionOptions,
) -> Result<(WatchSession, FakeWatcherFactory, mpsc::UnboundedReceiver<Trigger>), Box<dyn Error>> {
    init_tracing();
    let fs = MockFileSystem::new();
    fs.add_dir("/proj/src");

    let backend = FakeWatcherFactory::new();
    let (sink, rx) = ChannelTriggerSink::channel();
    let mut session = WatchSession::new(Arc::new(backend.clone()), Arc::new(sink), options)
        .with_filesystem(Arc::new(fs));

    session.build_started()?;
    session.task_executed(
        "compile",
        &TaskInputs::new().with_tree("/proj/src"),
        Path::new("/proj/build"),
    )?;
    session.build_finished()?;
    Ok((session, backend, rx))
}

fn received(rx: &mut mpsc::UnboundedReceiver<Trigger>) -> Vec<Trigger> {
    let mut out = Vec::new();
    while let Ok(t) = rx.try_recv() {
        out.push(t);
    }
    out
}

#[tokio::test(start_paused = true)]
async fn concurrent_events_fire_exactly_once() -> TestResult {
    let (_session, backend, mut rx) = armed_session(session_options(100, 1000))?;

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let listener = backend.listener();
            thread::spawn(move || {
                for i in 0..10 {
                    listener.on_change(format!("/proj/src/f{t}_{i}.x"));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().map_err(|_| "sender thread panicked")?;
    }

    tokio::time::sleep(Duration::from_secs(2)).await;

    let triggers = received(&mut rx);
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].kind, TriggerKind::Rebuild);
    assert!(triggers[0].reason.starts_with("file change"));
    assert!(triggers[0].reason.contains("+79 more events"));
    assert_eq!(backend.stopped(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn full_queue_is_reported_as_overflow() -> TestResult {
    let options = SessionOptions {
        event_queue_capacity: 4,
        ..session_options(100, 1000)
    };
    let (_session, backend, mut rx) = armed_session(options)?;

    let listener = backend.listener();
    for i in 0..32 {
        listener.on_change(format!("/proj/src/f{i}.x"));
    }

    tokio::time::sleep(Duration::from_secs(2)).await;

    let triggers = received(&mut rx);
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].kind, TriggerKind::Rebuild);
    assert!(triggers[0].reason.contains("overflow in file watching"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn quiet_period_extends_but_never_past_max_delay() -> TestResult {
    let (_session, backend, mut rx) = armed_session(session_options(100, 300))?;
    let listener = backend.listener();

    // An event every 50ms keeps resetting the quiet period.
    for i in 0..20 {
        listener.on_change(format!("/proj/src/f{i}.x"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        if i == 3 {
            assert!(received(&mut rx).is_empty(), "fired before max_delay");
        }
    }

    let triggers = received(&mut rx);
    assert_eq!(triggers.len(), 1);
    assert_eq!(backend.stopped(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn zero_quiet_period_fires_on_first_event() -> TestResult {
    let options = SessionOptions {
        debounce: DebounceConfig::immediate(),
        ..SessionOptions::default()
    };
    let (_session, backend, mut rx) = armed_session(options)?;

    backend.listener().on_change("/proj/src/a.x");
    backend.listener().on_change("/proj/src/b.x");
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert_eq!(received(&mut rx), vec![Trigger::rebuild("file change")]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn backend_error_during_burst_escalates_to_stop() -> TestResult {
    let (_session, backend, mut rx) = armed_session(session_options(100, 1000))?;
    let listener = backend.listener();

    listener.on_change("/proj/src/a.x");
    listener.on_error("inotify queue closed");
    tokio::time::sleep(Duration::from_secs(2)).await;

    let triggers = received(&mut rx);
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].kind, TriggerKind::Stop);
    assert!(triggers[0].reason.starts_with("error inotify queue closed"));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn events_after_firing_are_dropped() -> TestResult {
    let (_session, backend, mut rx) = armed_session(session_options(50, 500))?;
    let listener = backend.listener();

    listener.on_change("/proj/src/a.x");
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(listener.is_closed());

    listener.on_change("/proj/src/b.x");
    listener.on_overflow();
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert_eq!(received(&mut rx).len(), 1);
    assert_eq!(backend.stopped(), 1);
    Ok(())
}
