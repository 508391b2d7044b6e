// src/dag/registry.rs

//! Name -> task mapping. Passed explicitly to the executor and CLI.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::model::{ActionConfig, ConfigFile};
use crate::dag::graph::DagGraph;
use crate::dag::task::Task;
use crate::engine::TaskName;
use crate::errors::{Result, WavebuildError};
use crate::exec::action::TaskAction;
use crate::exec::builtin::{CleanAction, CopyAction, GroupAction};
use crate::exec::command::ShellAction;
use crate::exec::long_lived::{LongLivedAction, ProcessRegistry, Readiness};
use crate::types::parse_duration;

#[derive(Debug, Default, Clone)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskName, Arc<Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task. Fails with `DuplicateTask` if the name is taken.
    pub fn register(&mut self, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(WavebuildError::DuplicateTask(task.name));
        }
        debug!(task = %task.name, "registered task");
        self.tasks.insert(task.name.clone(), Arc::new(task));
        Ok(())
    }

    /// Look up a task. Fails with `UnknownTask` if absent.
    pub fn get(&self, name: &str) -> Result<&Arc<Task>> {
        self.tasks.get(name).ok_or_else(|| WavebuildError::UnknownTask {
            name: name.to_string(),
            required_by: None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// All tasks, ordered by name.
    pub fn all(&self) -> impl Iterator<Item = &Arc<Task>> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Closure validation: every dependency resolves and the graph is
    /// acyclic. Returns the validated graph.
    pub fn validate(&self) -> Result<DagGraph> {
        for task in self.tasks.values() {
            for dep in &task.dependencies {
                if !self.tasks.contains_key(dep) {
                    return Err(WavebuildError::UnknownTask {
                        name: dep.clone(),
                        required_by: Some(task.name.clone()),
                    });
                }
            }
        }

        let graph = DagGraph::from_registry(self);
        graph.waves()?;
        Ok(graph)
    }

    /// Build a registry from a validated config, turning each action
    /// reference into a concrete [`TaskAction`].
    ///
    /// `root` is the directory shell commands run in and relative paths are
    /// resolved against; `processes` tracks long-lived processes.
    pub fn from_config(
        cfg: &ConfigFile,
        root: &Path,
        processes: &Arc<ProcessRegistry>,
    ) -> Result<Self> {
        let default_timeout = cfg
            .config()
            .task_timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
            .map_err(WavebuildError::ConfigError)?;

        let mut registry = Self::new();

        for tc in cfg.tasks() {
            let action: Arc<dyn TaskAction> = match tc.effective_action() {
                ActionConfig::Shell { cmd } if tc.long_lived => {
                    let readiness = Readiness::from_config(
                        tc.ready_on_stdout.as_deref(),
                        tc.ready_after.as_deref(),
                    )
                    .map_err(WavebuildError::ConfigError)?;
                    Arc::new(LongLivedAction::new(
                        cmd,
                        root.to_path_buf(),
                        readiness,
                        Arc::clone(processes),
                    ))
                }
                ActionConfig::Shell { cmd } => Arc::new(ShellAction::new(cmd, root.to_path_buf())),
                ActionConfig::Copy { dest, base } => Arc::new(CopyAction::new(dest, base)),
                ActionConfig::Clean { paths } => Arc::new(CleanAction::new(paths)),
                ActionConfig::Group => Arc::new(GroupAction),
            };

            let timeout = tc
                .timeout
                .as_deref()
                .map(parse_duration)
                .transpose()
                .map_err(WavebuildError::ConfigError)?
                .or(default_timeout);

            let task = Task::new(tc.name.clone(), action)
                .depends_on(tc.depends_on.iter().cloned())
                .inputs(tc.inputs.iter().cloned())
                .outputs(tc.outputs.iter().cloned())
                .parallel(tc.parallel)
                .timeout(timeout)
                .report_size(tc.report_size);

            registry.register(task)?;
        }

        registry.validate()?;
        Ok(registry)
    }
}
