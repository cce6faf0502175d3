// src/dag/plan.rs

//! Ordered build plan derived from the validated config.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::ConfigFile;
use crate::engine::TaskName;
use crate::errors::{BuildwatchError, Result};
use crate::watch::InputSpec;

/// One task as it will be executed by a build iteration.
#[derive(Debug, Clone)]
pub struct PlannedTask {
    pub name: TaskName,
    pub cmd: String,
    pub inputs: InputSpec,
    /// Absolute output root for this task.
    pub output_root: PathBuf,
    /// Direct dependencies (`after = [...]`).
    pub after: Vec<TaskName>,
}

/// Tasks in a dependency-respecting execution order.
///
/// Ties between independent tasks are broken by name so the order is
/// deterministic across runs.
#[derive(Debug, Clone)]
pub struct BuildPlan {
    tasks: Vec<PlannedTask>,
}

impl BuildPlan {
    pub fn from_config(cfg: &ConfigFile, project_root: &Path) -> Result<Self> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for name in cfg.tasks().keys() {
            graph.add_node(name.as_str());
        }
        for (name, task) in cfg.tasks() {
            for dep in &task.after {
                graph.add_edge(dep.as_str(), name.as_str(), ());
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            BuildwatchError::DagCycle(format!(
                "cycle detected in task graph involving task '{}'",
                cycle.node_id()
            ))
        })?;
        let order = stable_order(&graph, order);

        let mut tasks = Vec::with_capacity(order.len());
        for name in order {
            let task = &cfg.tasks()[name];
            let inputs = InputSpec::compile(&task.dirs, &task.files, &task.exclude).map_err(|e| {
                BuildwatchError::ConfigError(format!("task '{}' has invalid inputs: {:#}", name, e))
            })?;
            tasks.push(PlannedTask {
                name: name.to_string(),
                cmd: task.cmd.clone(),
                inputs,
                output_root: project_root.join(cfg.output_root_for(task)),
                after: task.after.clone(),
            });
        }

        Ok(Self { tasks })
    }

    pub fn from_tasks(tasks: Vec<PlannedTask>) -> Self {
        Self { tasks }
    }

    pub fn tasks(&self) -> &[PlannedTask] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// True if any direct dependency of `task` is in `blocked`.
    pub fn is_blocked(task: &PlannedTask, blocked: &HashSet<TaskName>) -> bool {
        task.after.iter().any(|dep| blocked.contains(dep))
    }
}

/// Kahn's algorithm with a name-ordered ready set, restricted to the nodes
/// `toposort` returned.
fn stable_order<'a>(graph: &DiGraphMap<&'a str, ()>, nodes: Vec<&'a str>) -> Vec<&'a str> {
    let mut indegree: HashMap<&str, usize> = nodes
        .iter()
        .map(|n| {
            let deg = graph
                .neighbors_directed(*n, petgraph::Direction::Incoming)
                .count();
            (*n, deg)
        })
        .collect();

    let mut ready: std::collections::BTreeSet<&str> = indegree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(n, _)| *n)
        .collect();

    let mut out = Vec::with_capacity(nodes.len());
    while let Some(next) = ready.pop_first() {
        out.push(next);
        for succ in graph.neighbors_directed(next, petgraph::Direction::Outgoing) {
            if let Some(deg) = indegree.get_mut(succ) {
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(succ);
                }
            }
        }
    }
    out
}
