// src/engine/mod.rs

//! Orchestration engine for wavebuild.
//!
//! This module ties together:
//! - the wave scheduler of a single run
//! - the run session that records every task's result
//! - the run loop that reacts to task completions and cancellation
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`executor`].

use std::fmt;
use std::time::Duration;

use crate::errors::WavebuildError;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

/// Why a task did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The action reported an error.
    Action(String),
    /// The action exceeded its timeout.
    Timeout(Duration),
    /// The run was cancelled before or while the task ran.
    Cancelled,
    /// A dependency failed (or was itself blocked); the action never ran.
    UpstreamFailure(TaskName),
}

impl FailureReason {
    /// Map the reason onto the crate error taxonomy.
    pub fn to_error(&self, task: &str) -> WavebuildError {
        let task = task.to_string();
        match self {
            FailureReason::Action(message) => WavebuildError::TaskAction {
                task,
                message: message.clone(),
            },
            FailureReason::Timeout(after) => WavebuildError::Timeout { task, after: *after },
            FailureReason::Cancelled => WavebuildError::TaskAction {
                task,
                message: "cancelled".to_string(),
            },
            FailureReason::UpstreamFailure(upstream) => WavebuildError::UpstreamFailure {
                task,
                upstream: upstream.clone(),
            },
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Action(message) => write!(f, "{message}"),
            FailureReason::Timeout(after) => write!(f, "timeout after {after:?}"),
            FailureReason::Cancelled => write!(f, "cancelled"),
            FailureReason::UpstreamFailure(upstream) => {
                write!(f, "upstream failure ({upstream})")
            }
        }
    }
}

/// Outcome of a dispatched task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    /// Succeeded by skip: fingerprint unchanged, action not invoked.
    Skipped,
    Failed(FailureReason),
}

/// Events flowing into the run loop from executor workers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A worker picked the task up and is about to fingerprint / run it.
    TaskStarted { task: TaskName },
    /// A task reached a terminal outcome.
    TaskCompleted { task: TaskName, outcome: TaskOutcome },
    /// Stop dispatching and abort in-flight actions.
    CancelRequested,
}

pub mod core;
pub mod executor;
pub mod session;

pub use core::{CoreCommand, CoreRuntime, CoreStep};
pub use executor::Executor;
pub use session::{ExecutionResult, RunSession, SessionResult, TaskStatus};
