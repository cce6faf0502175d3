use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use buildwatch::dag::PlannedTask;
use buildwatch::engine::TaskOutcome;
use buildwatch::errors::Result;
use buildwatch::exec::BuildExecutor;

/// A fake executor that:
/// - records which tasks were "run", in order
/// - reports `Failed(1)` for tasks marked as failing, `Success` otherwise.
#[derive(Debug, Clone, Default)]
pub struct FakeExecutor {
    executed: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(self, task: &str) -> Self {
        self.failing.lock().unwrap().insert(task.to_string());
        self
    }

    pub fn set_failing(&self, task: &str, failing: bool) {
        let mut guard = self.failing.lock().unwrap();
        if failing {
            guard.insert(task.to_string());
        } else {
            guard.remove(task);
        }
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

impl BuildExecutor for FakeExecutor {
    fn execute<'a>(
        &'a mut self,
        task: &'a PlannedTask,
    ) -> Pin<Box<dyn Future<Output = Result<TaskOutcome>> + Send + 'a>> {
        Box::pin(async move {
            self.executed.lock().unwrap().push(task.name.clone());
            if self.failing.lock().unwrap().contains(&task.name) {
                Ok(TaskOutcome::Failed(1))
            } else {
                Ok(TaskOutcome::Success)
            }
        })
    }
}
