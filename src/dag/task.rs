// src/dag/task.rs

//! Task definitions and the per-run dispatch descriptor.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::TaskName;
use crate::exec::action::TaskAction;

/// A registered task: dependencies, declared inputs/outputs and the action.
#[derive(Clone)]
pub struct Task {
    pub name: TaskName,
    /// Direct dependencies (names in `depends_on`).
    pub dependencies: BTreeSet<TaskName>,
    /// Input globs relative to the project root; `!` prefix excludes.
    pub inputs: Vec<String>,
    /// Paths or globs the action must produce.
    pub outputs: Vec<String>,
    /// If false, the task runs with the whole worker pool to itself.
    pub parallel: bool,
    pub timeout: Option<Duration>,
    pub report_size: bool,
    pub action: Arc<dyn TaskAction>,
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("parallel", &self.parallel)
            .field("action", &self.action.describe())
            .finish_non_exhaustive()
    }
}

impl Task {
    pub fn new(name: impl Into<TaskName>, action: Arc<dyn TaskAction>) -> Self {
        Self {
            name: name.into(),
            dependencies: BTreeSet::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            parallel: true,
            timeout: None,
            report_size: false,
            action,
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TaskName>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    pub fn inputs<I, S>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.extend(globs.into_iter().map(Into::into));
        self
    }

    pub fn outputs<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outputs.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn report_size(mut self, report_size: bool) -> Self {
        self.report_size = report_size;
        self
    }
}

/// Description of a task that the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub task: Arc<Task>,
    /// Monotonically increasing run identifier shared by every task of a run.
    pub run_id: u64,
    /// Zero-based wave index within the run.
    pub wave: usize,
    /// True when every dependency of this task was skipped in this run, so
    /// an unchanged fingerprint may skip this task as well.
    pub upstream_unchanged: bool,
}

impl ScheduledTask {
    pub fn name(&self) -> &str {
        &self.task.name
    }
}
