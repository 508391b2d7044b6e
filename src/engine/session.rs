// src/engine/session.rs

//! Per-run bookkeeping: one [`ExecutionResult`] per task in the run.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use tracing::warn;

use crate::dag::resolver::Waves;
use crate::engine::{FailureReason, TaskName, TaskOutcome};
use crate::errors::WavebuildError;

/// Reported status of a task in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    /// Succeeded by skip (fingerprint unchanged).
    Skipped,
    Failed,
    /// Not attempted because of an upstream failure or cancellation.
    Blocked,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskStatus::Pending | TaskStatus::Running)
    }

    pub fn is_success(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Skipped)
    }

    pub fn label(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Succeeded => "ok",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Blocked => "BLOCKED",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub task: TaskName,
    /// Zero-based wave index.
    pub wave: usize,
    pub status: TaskStatus,
    pub started_at: Option<SystemTime>,
    pub finished_at: Option<SystemTime>,
    pub failure: Option<FailureReason>,
}

impl ExecutionResult {
    fn pending(task: TaskName, wave: usize) -> Self {
        Self {
            task,
            wave,
            status: TaskStatus::Pending,
            started_at: None,
            finished_at: None,
            failure: None,
        }
    }

    /// Wall time between start and finish, if both are known.
    pub fn duration(&self) -> Option<Duration> {
        let (start, end) = (self.started_at?, self.finished_at?);
        Some(end.duration_since(start).unwrap_or_default())
    }

    /// The failure as a crate error, for display.
    pub fn error(&self) -> Option<WavebuildError> {
        self.failure.as_ref().map(|f| f.to_error(&self.task))
    }
}

/// Overall result of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionResult {
    Succeeded,
    Failed,
}

impl SessionResult {
    pub fn exit_code(self) -> i32 {
        match self {
            SessionResult::Succeeded => 0,
            SessionResult::Failed => 1,
        }
    }
}

/// Count of tasks per terminal status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub blocked: usize,
}

/// Results of one orchestrator invocation, in wave order then name order.
#[derive(Debug, Clone)]
pub struct RunSession {
    run_id: u64,
    results: Vec<ExecutionResult>,
    index: HashMap<TaskName, usize>,
    completion_order: Vec<TaskName>,
    started_at: SystemTime,
    finished_at: Option<SystemTime>,
}

impl RunSession {
    pub fn new(run_id: u64, waves: &Waves) -> Self {
        let mut results = Vec::new();
        let mut index = HashMap::new();
        for (wave_idx, wave) in waves.iter().enumerate() {
            for name in wave {
                index.insert(name.clone(), results.len());
                results.push(ExecutionResult::pending(name.clone(), wave_idx));
            }
        }

        Self {
            run_id,
            results,
            index,
            completion_order: Vec::new(),
            started_at: SystemTime::now(),
            finished_at: None,
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn results(&self) -> &[ExecutionResult] {
        &self.results
    }

    pub fn get(&self, task: &str) -> Option<&ExecutionResult> {
        self.index.get(task).map(|&i| &self.results[i])
    }

    pub fn status_of(&self, task: &str) -> Option<TaskStatus> {
        self.get(task).map(|r| r.status)
    }

    /// Task names in the order they reached a terminal status.
    pub fn completion_order(&self) -> &[TaskName] {
        &self.completion_order
    }

    /// Tasks whose action actually ran (succeeded or failed), in completion order.
    pub fn executed(&self) -> Vec<&str> {
        self.completion_order
            .iter()
            .filter(|name| {
                matches!(
                    self.status_of(name),
                    Some(TaskStatus::Succeeded) | Some(TaskStatus::Failed)
                )
            })
            .map(String::as_str)
            .collect()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for r in &self.results {
            match r.status {
                TaskStatus::Succeeded => counts.succeeded += 1,
                TaskStatus::Skipped => counts.skipped += 1,
                TaskStatus::Failed => counts.failed += 1,
                TaskStatus::Blocked => counts.blocked += 1,
                TaskStatus::Pending | TaskStatus::Running => {}
            }
        }
        counts
    }

    pub fn result(&self) -> SessionResult {
        let all_ok = self.results.iter().all(|r| r.status.is_success());
        if all_ok {
            SessionResult::Succeeded
        } else {
            SessionResult::Failed
        }
    }

    pub fn is_complete(&self) -> bool {
        self.results.iter().all(|r| r.status.is_terminal())
    }

    pub fn elapsed(&self) -> Duration {
        self.finished_at
            .unwrap_or_else(SystemTime::now)
            .duration_since(self.started_at)
            .unwrap_or_default()
    }

    /// Pending -> Running.
    pub fn mark_running(&mut self, task: &str) {
        let Some(result) = self.result_mut(task) else {
            return;
        };
        if result.status != TaskStatus::Pending {
            warn!(task = %task, status = ?result.status, "session: ignoring Running transition");
            return;
        }
        result.status = TaskStatus::Running;
        result.started_at = Some(SystemTime::now());
    }

    /// Running (or Pending, when the backend never reported a start) -> terminal.
    pub fn mark_finished(&mut self, task: &str, outcome: &TaskOutcome) {
        let Some(result) = self.result_mut(task) else {
            return;
        };
        if result.status.is_terminal() {
            warn!(task = %task, status = ?result.status, "session: task already terminal");
            return;
        }

        let now = SystemTime::now();
        result.started_at.get_or_insert(now);
        result.finished_at = Some(now);
        match outcome {
            TaskOutcome::Succeeded => result.status = TaskStatus::Succeeded,
            TaskOutcome::Skipped => result.status = TaskStatus::Skipped,
            TaskOutcome::Failed(reason) => {
                result.status = TaskStatus::Failed;
                result.failure = Some(reason.clone());
            }
        }
        self.completion_order.push(task.to_string());
    }

    /// Pending -> Blocked.
    pub fn mark_blocked(&mut self, task: &str, reason: FailureReason) {
        let Some(result) = self.result_mut(task) else {
            return;
        };
        if result.status != TaskStatus::Pending {
            warn!(task = %task, status = ?result.status, "session: ignoring Blocked transition");
            return;
        }
        result.status = TaskStatus::Blocked;
        result.failure = Some(reason);
        result.finished_at = Some(SystemTime::now());
        self.completion_order.push(task.to_string());
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(SystemTime::now());
    }

    fn result_mut(&mut self, task: &str) -> Option<&mut ExecutionResult> {
        match self.index.get(task) {
            Some(&i) => Some(&mut self.results[i]),
            None => {
                warn!(task = %task, "session: task not part of this run");
                None
            }
        }
    }
}
