#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use buildwatch::config::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig};
use buildwatch::dag::PlannedTask;
use buildwatch::engine::SessionOptions;
use buildwatch::watch::{DebounceConfig, InputSpec};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn output_root(mut self, root: &str) -> Self {
        self.config.config.output_root = root.to_string();
        self
    }

    pub fn quiet_period(mut self, value: &str) -> Self {
        self.config.config.quiet_period = value.to_string();
        self
    }

    pub fn max_delay(mut self, value: &str) -> Self {
        self.config.config.max_delay = value.to_string();
        self
    }

    pub fn event_queue_capacity(mut self, capacity: usize) -> Self {
        self.config.config.event_queue_capacity = capacity;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: cmd.to_string(),
                dirs: vec![],
                files: vec![],
                exclude: vec![],
                after: vec![],
                output_root: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn dir(mut self, dir: &str) -> Self {
        self.task.dirs.push(dir.to_string());
        self
    }

    pub fn file(mut self, pattern: &str) -> Self {
        self.task.files.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.task.exclude.push(pattern.to_string());
        self
    }

    pub fn output_root(mut self, root: &str) -> Self {
        self.task.output_root = Some(root.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Builder for a `PlannedTask` without going through a config file.
pub struct PlannedTaskBuilder {
    name: String,
    cmd: String,
    dirs: Vec<String>,
    files: Vec<String>,
    exclude: Vec<String>,
    output_root: PathBuf,
    after: Vec<String>,
}

impl PlannedTaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cmd: format!("echo {name}"),
            dirs: vec![],
            files: vec![],
            exclude: vec![],
            output_root: PathBuf::from("/proj/build"),
            after: vec![],
        }
    }

    pub fn dir(mut self, dir: &str) -> Self {
        self.dirs.push(dir.to_string());
        self
    }

    pub fn file(mut self, pattern: &str) -> Self {
        self.files.push(pattern.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.after.push(dep.to_string());
        self
    }

    pub fn output_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.output_root = root.into();
        self
    }

    pub fn build(self) -> PlannedTask {
        PlannedTask {
            inputs: InputSpec::compile(&self.dirs, &self.files, &self.exclude)
                .expect("valid input patterns"),
            name: self.name,
            cmd: self.cmd,
            output_root: self.output_root,
            after: self.after,
        }
    }
}

/// Session options with a short, fixed debounce window.
pub fn session_options(quiet_ms: u64, max_ms: u64) -> SessionOptions {
    SessionOptions {
        debounce: DebounceConfig {
            quiet_period: Duration::from_millis(quiet_ms),
            max_delay: Duration::from_millis(max_ms),
        },
        ..SessionOptions::default()
    }
}
