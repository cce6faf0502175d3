// src/engine/mod.rs

//! Continuous-build engine.
//!
//! This module ties together:
//! - the watch session state machine ([`session`]) that owns the file
//!   watcher across build iterations
//! - the trigger types and sink that carry "rebuild" / "stop" decisions
//!   ([`trigger`])
//! - the driving loop that runs builds and reacts to triggers ([`driver`])

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Outcome of a single task process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed(i32),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success)
    }
}

pub mod driver;
pub mod session;
pub mod trigger;

pub use driver::{BuildReport, ContinuousDriver, DriverExit, DriverOptions};
pub use session::{SessionOptions, SessionPhase, WatchSession};
pub use trigger::{ChannelTriggerSink, Trigger, TriggerKind, TriggerSink};
