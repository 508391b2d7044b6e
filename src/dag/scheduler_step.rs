// src/dag/scheduler_step.rs

//! Step-by-step execution result types for the scheduler.

use crate::dag::task::ScheduledTask;
use crate::engine::{FailureReason, TaskName};

/// Structured result of a single scheduler "step".
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that should be dispatched to the executor now.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks that reached `Blocked` in this step, with the reason.
    pub newly_blocked: Vec<(TaskName, FailureReason)>,
    /// Whether this step finished the run.
    pub run_just_finished: bool,
}
