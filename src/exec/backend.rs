// src/exec/backend.rs

//! Pluggable build executor abstraction.
//!
//! The continuous driver talks to a `BuildExecutor` instead of spawning
//! processes itself, so tests can substitute a fake that records which tasks
//! ran and returns canned outcomes.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use crate::dag::PlannedTask;
use crate::engine::TaskOutcome;
use crate::errors::Result;

use super::command::run_shell_command;

/// Trait abstracting how a planned task is executed.
pub trait BuildExecutor: Send {
    /// Run `task` to completion and report its outcome.
    ///
    /// An `Err` means the task could not be run at all (for example the
    /// shell could not be spawned); the driver treats it as a failure.
    fn execute<'a>(
        &'a mut self,
        task: &'a PlannedTask,
    ) -> Pin<Box<dyn Future<Output = Result<TaskOutcome>> + Send + 'a>>;
}

/// Executor used in production: runs `cmd` via the platform shell.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    working_dir: PathBuf,
}

impl ProcessExecutor {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }
}

impl BuildExecutor for ProcessExecutor {
    fn execute<'a>(
        &'a mut self,
        task: &'a PlannedTask,
    ) -> Pin<Box<dyn Future<Output = Result<TaskOutcome>> + Send + 'a>> {
        Box::pin(async move { Ok(run_shell_command(&task.name, &task.cmd, &self.working_dir).await?) })
    }
}
