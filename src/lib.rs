// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::dag::BuildPlan;
use crate::engine::session::NO_INPUTS_REASON;
use crate::engine::{
    ChannelTriggerSink, ContinuousDriver, DriverExit, DriverOptions, SessionOptions, WatchSession,
};
use crate::exec::ProcessExecutor;
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::{DebounceConfig, InputCollector, NotifyWatcherFactory};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and the build plan
/// - the watch session with the `notify` backend
/// - the process executor
/// - Ctrl-C handling
///
/// Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    let project_root = project_root_dir(&config_path)?;

    let plan = BuildPlan::from_config(&cfg, &project_root)?;

    if args.dry_run {
        print_dry_run(&cfg, &plan, &project_root)?;
        return Ok(0);
    }

    let (sink, triggers) = ChannelTriggerSink::channel();
    let session = WatchSession::new(
        Arc::new(NotifyWatcherFactory),
        Arc::new(sink),
        session_options(&cfg),
    );

    let options = DriverOptions::new(&project_root).once(args.once);
    let executor = ProcessExecutor::new(&project_root);
    let mut driver = ContinuousDriver::new(plan, session, executor, triggers, options);

    info!(root = %project_root.display(), once = args.once, "buildwatch starting");

    let exit = driver.run(ctrl_c()).await?;
    Ok(exit_code(&exit))
}

/// Watch-session tuning taken from `[config]`.
pub fn session_options(cfg: &ConfigFile) -> SessionOptions {
    SessionOptions {
        debounce: DebounceConfig {
            quiet_period: cfg.quiet_period(),
            max_delay: cfg.max_delay(),
        },
        event_queue_capacity: cfg.config_section().event_queue_capacity,
    }
}

/// Process exit code for a finished driver.
///
/// A stop caused by anything other than "nothing to watch" is a watcher
/// failure and exits non-zero.
pub fn exit_code(exit: &DriverExit) -> i32 {
    match exit {
        DriverExit::Completed(report) if report.is_success() => 0,
        DriverExit::Completed(_) => 1,
        DriverExit::Stopped(trigger) if trigger.reason == NO_INPUTS_REASON => 0,
        DriverExit::Stopped(_) => 1,
        DriverExit::Interrupted => 0,
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("failed to listen for Ctrl+C: {e}");
        // Without a signal handler we can only stop on a trigger.
        std::future::pending::<()>().await;
    }
}

/// Directory containing the config file, canonicalized.
fn project_root_dir(config_path: &Path) -> Result<PathBuf> {
    let dir = match config_path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    RealFileSystem
        .canonicalize(&dir)
        .with_context(|| format!("resolving project root {}", dir.display()))
}

/// Print tasks in execution order and the roots a first build would watch.
fn print_dry_run(cfg: &ConfigFile, plan: &BuildPlan, project_root: &Path) -> Result<()> {
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);

    println!("buildwatch dry-run");
    println!("  project root = {}", project_root.display());
    println!("  config.quiet_period = {:?}", cfg.quiet_period());
    println!("  config.max_delay = {:?}", cfg.max_delay());
    println!(
        "  config.event_queue_capacity = {}",
        cfg.config_section().event_queue_capacity
    );
    println!();

    let mut collector = InputCollector::new(Arc::clone(&fs));
    println!("tasks ({}):", plan.len());
    for task in plan.tasks() {
        println!("  - {}", task.name);
        println!("      cmd: {}", task.cmd);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        println!("      output_root: {}", task.output_root.display());

        let inputs = task.inputs.resolve(fs.as_ref(), project_root)?;
        let summary = collector.append_task_inputs(&inputs, &task.output_root);
        if summary.excluded > 0 {
            println!("      inputs under output root: {}", summary.excluded);
        }
    }
    println!();

    let roots = collector.into_watched().freeze();
    println!("watch roots ({}):", roots.len());
    for root in roots.iter() {
        let kind = if root.is_directory() { "dir " } else { "file" };
        println!("  {kind} {}", root.path().display());
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{BuildReport, Trigger};

    #[test]
    fn exit_codes() {
        assert_eq!(exit_code(&DriverExit::Interrupted), 0);
        assert_eq!(exit_code(&DriverExit::Completed(BuildReport::default())), 0);
        assert_eq!(
            exit_code(&DriverExit::Completed(BuildReport {
                failed: vec!["compile".into()],
                ..BuildReport::default()
            })),
            1
        );
        assert_eq!(exit_code(&DriverExit::Stopped(Trigger::stop(NO_INPUTS_REASON))), 0);
        assert_eq!(
            exit_code(&DriverExit::Stopped(Trigger::stop("error watch limit reached"))),
            1
        );
    }
}
