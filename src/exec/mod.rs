// src/exec/mod.rs

//! Task execution.
//!
//! - [`backend`] defines the [`BuildExecutor`] seam and the process-backed
//!   implementation.
//! - [`command`] spawns a single shell command and waits for it.

pub mod backend;
pub mod command;

pub use backend::{BuildExecutor, ProcessExecutor};
