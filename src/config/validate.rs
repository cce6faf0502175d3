// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::duration::parse_duration;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BuildwatchError, Result};
use crate::watch::InputSpec;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::BuildwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let quiet_period = duration_field("quiet_period", &raw.config.quiet_period)?;
        let max_delay = duration_field("max_delay", &raw.config.max_delay)?;
        Ok(ConfigFile::new_unchecked(
            raw.config,
            raw.task,
            quiet_period,
            max_delay,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_task_inputs(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(BuildwatchError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.event_queue_capacity == 0 {
        return Err(BuildwatchError::ConfigError(
            "[config].event_queue_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    if cfg.config.output_root.trim().is_empty() {
        return Err(BuildwatchError::ConfigError(
            "[config].output_root must not be empty".to_string(),
        ));
    }

    let quiet = duration_field("quiet_period", &cfg.config.quiet_period)?;
    let max = duration_field("max_delay", &cfg.config.max_delay)?;
    if max < quiet {
        return Err(BuildwatchError::ConfigError(format!(
            "[config].max_delay ({}) must not be shorter than quiet_period ({})",
            cfg.config.max_delay, cfg.config.quiet_period
        )));
    }

    Ok(())
}

fn validate_task_inputs(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        InputSpec::compile(&task.dirs, &task.files, &task.exclude).map_err(|e| {
            BuildwatchError::ConfigError(format!("task '{}' has invalid inputs: {:#}", name, e))
        })?;
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(BuildwatchError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
            if dep == name {
                return Err(BuildwatchError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(BuildwatchError::DagCycle(format!(
                "cycle detected in task graph involving task '{}'",
                node
            )))
        }
    }
}

fn duration_field(field: &str, value: &str) -> Result<std::time::Duration> {
    parse_duration(value).map_err(|e| {
        BuildwatchError::ConfigError(format!("[config].{field} = {value:?}: {e}"))
    })
}
