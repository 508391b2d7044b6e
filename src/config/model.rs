// src/config/model.rs

use serde::Deserialize;

use crate::types::{FingerprintStorage, TriggerWhileRunningBehaviour};

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// default_task = "build"
/// jobs = 4
///
/// [[task]]
/// name = "styles"
/// inputs = ["app/styles/**/*.scss"]
/// outputs = [".tmp/styles/main.css"]
/// cmd = "sass app/styles/main.scss .tmp/styles/main.css"
///
/// [[task]]
/// name = "build"
/// depends_on = ["styles"]
/// ```
///
/// Tasks are an array of tables so that a repeated `name` can be reported as
/// a duplicate instead of being silently merged.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[[task]]`, in file order.
    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// A validated configuration. Only constructible through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    task: Vec<TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(config: ConfigSection, task: Vec<TaskConfig>) -> Self {
        Self { config, task }
    }

    pub fn config(&self) -> &ConfigSection {
        &self.config
    }

    pub fn tasks(&self) -> &[TaskConfig] {
        &self.task
    }

    pub fn task(&self, name: &str) -> Option<&TaskConfig> {
        self.task.iter().find(|t| t.name == name)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Task run when `wavebuild run` is given no task names.
    #[serde(default = "default_task_name")]
    pub default_task: String,

    /// Maximum number of actions running at the same time inside a wave.
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Quiet period after the last file change before watch mode triggers.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Timeout applied to tasks that do not set their own, e.g. `"10m"`.
    #[serde(default)]
    pub task_timeout: Option<String>,

    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    #[serde(default)]
    pub fingerprint_storage: FingerprintStorage,
}

fn default_task_name() -> String {
    "default".to_string()
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_debounce_ms() -> u64 {
    100
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            default_task: default_task_name(),
            jobs: default_jobs(),
            debounce_ms: default_debounce_ms(),
            task_timeout: None,
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            fingerprint_storage: FingerprintStorage::default(),
        }
    }
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Unique task name.
    pub name: String,

    /// Tasks that must finish successfully before this one runs.
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Input globs relative to the project root. A leading `!` excludes.
    #[serde(default)]
    pub inputs: Vec<String>,

    /// Paths or globs the action is expected to produce.
    #[serde(default)]
    pub outputs: Vec<String>,

    /// If false, the task never shares the worker pool with siblings.
    #[serde(default = "default_parallel")]
    pub parallel: bool,

    /// Shell command shorthand for `action = { kind = "shell", cmd = "..." }`.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Explicit action. Mutually exclusive with `cmd`.
    #[serde(default)]
    pub action: Option<ActionConfig>,

    /// Per-task timeout, e.g. `"30s"`. Overrides `[config].task_timeout`.
    #[serde(default)]
    pub timeout: Option<String>,

    /// Print the size of the declared outputs after the run.
    #[serde(default)]
    pub report_size: bool,

    /// The command keeps running after the task is considered done
    /// (dev servers and similar).
    #[serde(default)]
    pub long_lived: bool,

    /// Regex; a long-lived task is ready once a stdout line matches.
    #[serde(default)]
    pub ready_on_stdout: Option<String>,

    /// Duration; a long-lived task is ready once this much time has passed.
    #[serde(default)]
    pub ready_after: Option<String>,
}

fn default_parallel() -> bool {
    true
}

/// Action reference for a task.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", deny_unknown_fields)]
pub enum ActionConfig {
    /// Run a command through the platform shell.
    Shell { cmd: String },
    /// Copy every resolved input into each destination directory, keeping
    /// its path relative to the glob base (or to `base` when given).
    Copy {
        dest: Vec<String>,
        #[serde(default)]
        base: Option<String>,
    },
    /// Remove the given paths (files or directories).
    Clean { paths: Vec<String> },
    /// No action; the task only aggregates its dependencies.
    Group,
}

impl TaskConfig {
    /// The action this task runs, resolving the `cmd` shorthand.
    pub fn effective_action(&self) -> ActionConfig {
        match (&self.action, &self.cmd) {
            (Some(action), _) => action.clone(),
            (None, Some(cmd)) => ActionConfig::Shell { cmd: cmd.clone() },
            (None, None) => ActionConfig::Group,
        }
    }
}
