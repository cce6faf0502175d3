// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// output_root = "build"
/// quiet_period = "200ms"
///
/// [task.generate]
/// cmd = "./gen.sh"
/// dirs = ["schema"]
///
/// [task.compile]
/// cmd = "make"
/// files = ["Makefile", "src/**/*.c"]
/// after = ["generate"]
/// ```
///
/// This is the unvalidated form; convert it with `ConfigFile::try_from`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Build output directory, relative to the project root. Inputs under it
    /// are never watched.
    #[serde(default = "default_output_root")]
    pub output_root: String,

    /// Quiet period used to coalesce a burst of file events, e.g. `"200ms"`.
    /// `"0ms"` fires on the first relevant event.
    #[serde(default = "default_quiet_period")]
    pub quiet_period: String,

    /// Upper bound between the first relevant event and the trigger.
    #[serde(default = "default_max_delay")]
    pub max_delay: String,

    /// Capacity of the channel between the OS watcher and the debouncer.
    /// Events beyond it are reported as an overflow.
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
}

fn default_output_root() -> String {
    "build".to_string()
}

fn default_quiet_period() -> String {
    "200ms".to_string()
}

fn default_max_delay() -> String {
    "1s".to_string()
}

fn default_event_queue_capacity() -> usize {
    crate::engine::session::DEFAULT_EVENT_QUEUE_CAPACITY
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            quiet_period: default_quiet_period(),
            max_delay: default_max_delay(),
            event_queue_capacity: default_event_queue_capacity(),
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    /// The command to execute.
    pub cmd: String,

    /// Directory-tree inputs; each is watched as a whole.
    #[serde(default)]
    pub dirs: Vec<String>,

    /// File inputs: literal paths or glob patterns relative to the project
    /// root.
    #[serde(default)]
    pub files: Vec<String>,

    /// Glob patterns removed from the `files` expansion.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Dependency list: this task runs after every task listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Per-task override of `[config].output_root`.
    #[serde(default)]
    pub output_root: Option<String>,
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (see `validate.rs`).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    task: BTreeMap<String, TaskConfig>,
    quiet_period: Duration,
    max_delay: Duration,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        task: BTreeMap<String, TaskConfig>,
        quiet_period: Duration,
        max_delay: Duration,
    ) -> Self {
        Self {
            config,
            task,
            quiet_period,
            max_delay,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Effective output root (relative) for `task`.
    pub fn output_root_for<'a>(&'a self, task: &'a TaskConfig) -> &'a str {
        task.output_root
            .as_deref()
            .unwrap_or(self.config.output_root.as_str())
    }
}
