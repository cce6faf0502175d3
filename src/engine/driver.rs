// src/engine/driver.rs

//! Continuous-build loop.
//!
//! The driver runs the [`BuildPlan`] once per iteration and tells the
//! [`WatchSession`] about every task it executes. After a build it waits for
//! the session's trigger (or the shutdown signal) and either loops or exits.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::{BuildPlan, PlannedTask};
use crate::engine::session::WatchSession;
use crate::engine::trigger::{Trigger, TriggerKind};
use crate::engine::{TaskName, TaskOutcome};
use crate::errors::{BuildwatchError, Result};
use crate::exec::BuildExecutor;
use crate::fs::{FileSystem, RealFileSystem};

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Run a single build and return without watching.
    pub once: bool,
    /// Directory task inputs are resolved against.
    pub project_root: PathBuf,
}

impl DriverOptions {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            once: false,
            project_root: project_root.into(),
        }
    }

    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }
}

/// What happened to each task in one build iteration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub succeeded: Vec<TaskName>,
    pub failed: Vec<TaskName>,
    /// Tasks not run because a dependency failed or was skipped.
    pub skipped: Vec<TaskName>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Why [`ContinuousDriver::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverExit {
    /// `once` mode: the single build finished.
    Completed(BuildReport),
    /// The watch session asked to leave continuous mode.
    Stopped(Trigger),
    /// The shutdown future resolved.
    Interrupted,
}

enum Wake {
    Trigger(Option<Trigger>),
    Shutdown,
}

pub struct ContinuousDriver<E: BuildExecutor> {
    plan: BuildPlan,
    session: WatchSession,
    executor: E,
    triggers: mpsc::UnboundedReceiver<Trigger>,
    options: DriverOptions,
    fs: Arc<dyn FileSystem>,
    iteration: u64,
}

impl<E: BuildExecutor> ContinuousDriver<E> {
    /// `triggers` must be the receiving side of the sink the session was
    /// built with.
    pub fn new(
        plan: BuildPlan,
        session: WatchSession,
        executor: E,
        triggers: mpsc::UnboundedReceiver<Trigger>,
        options: DriverOptions,
    ) -> Self {
        Self {
            plan,
            session,
            executor,
            triggers,
            options,
            fs: Arc::new(RealFileSystem),
            iteration: 0,
        }
    }

    /// Filesystem used to expand task input globs.
    pub fn with_filesystem(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = fs;
        self
    }

    pub fn session(&self) -> &WatchSession {
        &self.session
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Number of builds started so far.
    pub fn iterations(&self) -> u64 {
        self.iteration
    }

    /// Run builds until a stop trigger, `shutdown` resolving, or (in `once`
    /// mode) the first build completing.
    pub async fn run<S>(&mut self, shutdown: S) -> Result<DriverExit>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            self.discard_stale_triggers();
            self.session.build_started()?;
            self.iteration += 1;
            info!(iteration = self.iteration, tasks = self.plan.len(), "build started");

            let report = tokio::select! {
                report = self.run_build() => Some(report),
                _ = &mut shutdown => None,
            };
            let Some(report) = report else {
                info!("shutdown requested during build");
                self.session.shutdown();
                return Ok(DriverExit::Interrupted);
            };
            let report = report?;
            log_report(self.iteration, &report);

            if self.options.once {
                self.session.shutdown();
                return Ok(DriverExit::Completed(report));
            }

            self.session.build_finished()?;

            let wake = tokio::select! {
                trigger = self.triggers.recv() => Wake::Trigger(trigger),
                _ = &mut shutdown => Wake::Shutdown,
            };

            match wake {
                Wake::Trigger(Some(trigger)) => match trigger.kind {
                    TriggerKind::Rebuild => {
                        info!(reason = %trigger.reason, "change detected; rebuilding");
                    }
                    TriggerKind::Stop => {
                        warn!(reason = %trigger.reason, "leaving continuous mode");
                        self.session.shutdown();
                        return Ok(DriverExit::Stopped(trigger));
                    }
                },
                Wake::Trigger(None) => {
                    self.session.shutdown();
                    return Err(BuildwatchError::Other(anyhow::anyhow!(
                        "trigger channel closed while waiting for changes"
                    )));
                }
                Wake::Shutdown => {
                    info!("shutdown requested; stopping watch session");
                    self.session.shutdown();
                    return Ok(DriverExit::Interrupted);
                }
            }
        }
    }

    async fn run_build(&mut self) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        let mut blocked: HashSet<TaskName> = HashSet::new();

        for task in self.plan.tasks() {
            if BuildPlan::is_blocked(task, &blocked) {
                warn!(task = %task.name, "skipping task; a dependency did not succeed");
                blocked.insert(task.name.clone());
                report.skipped.push(task.name.clone());
                continue;
            }

            let recorded = record_inputs(
                &mut self.session,
                self.fs.as_ref(),
                &self.options.project_root,
                task,
            );
            let outcome = match recorded {
                Ok(()) => match self.executor.execute(task).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        error!(task = %task.name, error = %err, "task execution error");
                        TaskOutcome::Failed(-1)
                    }
                },
                Err(BuildwatchError::Session(err)) => return Err(err.into()),
                Err(err) => {
                    error!(task = %task.name, error = %err, "failed to resolve task inputs");
                    TaskOutcome::Failed(-1)
                }
            };

            if outcome.is_success() {
                report.succeeded.push(task.name.clone());
            } else {
                blocked.insert(task.name.clone());
                report.failed.push(task.name.clone());
            }
        }

        Ok(report)
    }

    fn discard_stale_triggers(&mut self) {
        while let Ok(trigger) = self.triggers.try_recv() {
            debug!(%trigger, "discarding trigger from a previous iteration");
        }
    }
}

/// Inputs are recorded before the task runs so a failing task still gets
/// watched.
fn record_inputs(
    session: &mut WatchSession,
    fs: &dyn FileSystem,
    project_root: &Path,
    task: &PlannedTask,
) -> Result<()> {
    let inputs = task.inputs.resolve(fs, project_root)?;
    session.task_executed(&task.name, &inputs, &task.output_root)?;
    Ok(())
}

fn log_report(iteration: u64, report: &BuildReport) {
    if report.is_success() {
        info!(iteration, succeeded = report.succeeded.len(), "build finished");
    } else {
        warn!(
            iteration,
            succeeded = report.succeeded.len(),
            failed = ?report.failed,
            skipped = ?report.skipped,
            "build finished with failures"
        );
    }
}
