// tests/driver_fake_executor.rs

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use buildwatch::dag::BuildPlan;
use buildwatch::engine::session::NO_INPUTS_REASON;
use buildwatch::engine::{
    BuildReport, ChannelTriggerSink, ContinuousDriver, DriverExit, DriverOptions, Trigger,
    TriggerKind, WatchSession,
};
use buildwatch::exit_code;
use buildwatch::fs::mock::MockFileSystem;
use buildwatch::watch::WatchRoot;
use buildwatch_test_utils::builders::{session_options, PlannedTaskBuilder};
use buildwatch_test_utils::fake_backend::{FakeWatcherFactory, InjectedFailure};
use buildwatch_test_utils::fake_executor::FakeExecutor;
use buildwatch_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn project_fs() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/main.x");
    fs.add_file("/proj/src/util.x");
    fs.add_file("/proj/schema/api.def");
    fs.add_dir("/proj/build");
    fs
}

fn chain_plan() -> BuildPlan {
    BuildPlan::from_tasks(vec![
        PlannedTaskBuilder::new("generate").dir("schema").build(),
        PlannedTaskBuilder::new("compile")
            .file("src/*.x")
            .after("generate")
            .build(),
    ])
}

fn driver(
    plan: BuildPlan,
    backend: &FakeWatcherFactory,
    executor: &FakeExecutor,
    once: bool,
) -> ContinuousDriver<FakeExecutor> {
    init_tracing();
    let fs = Arc::new(project_fs());
    let (sink, triggers) = ChannelTriggerSink::channel();
    let session = WatchSession::new(
        Arc::new(backend.clone()),
        Arc::new(sink),
        session_options(50, 500),
    )
    .with_filesystem(fs.clone());

    ContinuousDriver::new(
        plan,
        session,
        executor.clone(),
        triggers,
        DriverOptions::new("/proj").once(once),
    )
    .with_filesystem(fs)
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    while !cond() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test(start_paused = true)]
async fn once_mode_runs_plan_without_watching() -> TestResult {
    let backend = FakeWatcherFactory::new();
    let executor = FakeExecutor::new();
    let mut driver = driver(chain_plan(), &backend, &executor, true);

    let exit = with_timeout(driver.run(std::future::pending())).await?;

    assert_eq!(
        exit,
        DriverExit::Completed(BuildReport {
            succeeded: vec!["generate".into(), "compile".into()],
            ..BuildReport::default()
        })
    );
    assert_eq!(executor.executed(), vec!["generate", "compile"]);
    assert_eq!(backend.created(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_task_skips_dependents_but_not_siblings() -> TestResult {
    let backend = FakeWatcherFactory::new();
    let executor = FakeExecutor::new().failing("generate");
    let plan = BuildPlan::from_tasks(vec![
        PlannedTaskBuilder::new("generate").dir("schema").build(),
        PlannedTaskBuilder::new("compile").after("generate").build(),
        PlannedTaskBuilder::new("link").after("compile").build(),
        PlannedTaskBuilder::new("docs").build(),
    ]);
    let mut driver = driver(plan, &backend, &executor, true);

    let exit = with_timeout(driver.run(std::future::pending())).await?;

    let report = match exit {
        DriverExit::Completed(report) => report,
        other => return Err(format!("unexpected exit: {other:?}").into()),
    };
    assert_eq!(report.failed, vec!["generate"]);
    assert_eq!(report.skipped, vec!["compile", "link"]);
    assert_eq!(report.succeeded, vec!["docs"]);
    assert_eq!(executor.executed(), vec!["generate", "docs"]);
    assert_eq!(exit_code(&DriverExit::Completed(report)), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn change_triggers_rebuild_until_shutdown() -> TestResult {
    let backend = FakeWatcherFactory::new();
    let executor = FakeExecutor::new();
    let mut driver = driver(chain_plan(), &backend, &executor, false);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let script = {
        let backend = backend.clone();
        let executor = executor.clone();
        async move {
            wait_until(|| backend.created() == 1).await;
            assert_eq!(
                backend.last_watched(),
                Some(vec![
                    WatchRoot::tree("/proj/schema"),
                    WatchRoot::file("/proj/src/main.x"),
                    WatchRoot::file("/proj/src/util.x"),
                ])
            );

            backend.listener().on_change("/proj/src/util.x");
            wait_until(|| backend.created() == 2).await;
            assert_eq!(executor.executed().len(), 4);

            let _ = stop_tx.send(());
        }
    };

    let shutdown = async {
        let _ = stop_rx.await;
    };
    let (exit, ()) = with_timeout(async { tokio::join!(driver.run(shutdown), script) }).await;

    assert_eq!(exit?, DriverExit::Interrupted);
    assert_eq!(driver.iterations(), 2);
    assert_eq!(backend.stopped(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failing_task_inputs_are_still_watched() -> TestResult {
    let backend = FakeWatcherFactory::new();
    let executor = FakeExecutor::new().failing("generate");
    let mut driver = driver(chain_plan(), &backend, &executor, false);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let script = {
        let backend = backend.clone();
        async move {
            wait_until(|| backend.created() == 1).await;
            let _ = stop_tx.send(());
        }
    };

    let shutdown = async {
        let _ = stop_rx.await;
    };
    let (exit, ()) = with_timeout(async { tokio::join!(driver.run(shutdown), script) }).await;

    assert_eq!(exit?, DriverExit::Interrupted);
    assert_eq!(
        backend.last_watched(),
        Some(vec![WatchRoot::tree("/proj/schema")])
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn build_without_inputs_leaves_continuous_mode() -> TestResult {
    let backend = FakeWatcherFactory::new();
    let executor = FakeExecutor::new();
    let plan = BuildPlan::from_tasks(vec![PlannedTaskBuilder::new("hello").build()]);
    let mut driver = driver(plan, &backend, &executor, false);

    let exit = with_timeout(driver.run(std::future::pending())).await?;

    assert_eq!(exit, DriverExit::Stopped(Trigger::stop(NO_INPUTS_REASON)));
    assert_eq!(exit_code(&exit), 0);
    assert_eq!(executor.executed(), vec!["hello"]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn watcher_failure_ends_loop_with_error_exit() -> TestResult {
    let backend = FakeWatcherFactory::new();
    backend.fail_with(InjectedFailure::Watch);
    let executor = FakeExecutor::new();
    let mut driver = driver(chain_plan(), &backend, &executor, false);

    let exit = with_timeout(driver.run(std::future::pending())).await?;

    let DriverExit::Stopped(trigger) = &exit else {
        return Err(format!("unexpected exit: {exit:?}").into());
    };
    assert_eq!(trigger.kind, TriggerKind::Stop);
    assert!(trigger.reason.contains("injected watch failure"));
    assert_eq!(exit_code(&exit), 1);
    assert_eq!(driver.iterations(), 1);
    Ok(())
}
