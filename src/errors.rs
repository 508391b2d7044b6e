// src/errors.rs

//! Crate-wide error taxonomy and helpers.

use std::time::Duration;

use thiserror::Error;

use crate::engine::TaskName;

#[derive(Error, Debug)]
pub enum WavebuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("duplicate task '{0}': a task with this name is already registered")]
    DuplicateTask(TaskName),

    #[error("unknown task '{name}'{}", required_by_suffix(.required_by))]
    UnknownTask {
        name: TaskName,
        /// The task whose `depends_on` referenced `name`, if any.
        required_by: Option<TaskName>,
    },

    #[error("cycle detected in task graph involving: {}", .0.join(", "))]
    CycleDetected(Vec<TaskName>),

    #[error("task '{task}' failed: {message}")]
    TaskAction { task: TaskName, message: String },

    #[error("task '{task}' timed out after {after:?}")]
    Timeout { task: TaskName, after: Duration },

    #[error("task '{task}' blocked: upstream failure in '{upstream}'")]
    UpstreamFailure { task: TaskName, upstream: TaskName },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn required_by_suffix(required_by: &Option<TaskName>) -> String {
    match required_by {
        Some(task) => format!(" (listed in depends_on of '{task}')"),
        None => String::new(),
    }
}

impl WavebuildError {
    /// Errors that make the task graph unusable. These abort a run before
    /// any action executes.
    pub fn is_graph_error(&self) -> bool {
        matches!(
            self,
            WavebuildError::ConfigError(_)
                | WavebuildError::DuplicateTask(_)
                | WavebuildError::UnknownTask { .. }
                | WavebuildError::CycleDetected(_)
                | WavebuildError::TomlError(_)
        )
    }

    /// Process exit code for this error: 2 for a malformed graph or config,
    /// 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        if self.is_graph_error() { 2 } else { 1 }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WavebuildError>;
