use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::registry::TaskRegistry;
use crate::dag::resolver::Waves;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::task::{ScheduledTask, Task};
use crate::engine::{FailureReason, TaskName, TaskOutcome};
use crate::errors::Result;

/// Per-run state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Waiting for its wave.
    Pending,
    /// Dispatched to the executor.
    Running,
    Succeeded,
    /// Succeeded without invoking the action (unchanged fingerprint).
    Skipped,
    Failed,
    /// Not attempted because a dependency failed or the run was cancelled.
    Blocked,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }

    fn is_unsuccessful(self) -> bool {
        matches!(self, RunState::Failed | RunState::Blocked)
    }
}

/// Wave-by-wave state machine for a single run.
///
/// It owns the resolved waves of the run's closure plus the per-task state,
/// and decides:
/// - which tasks to dispatch when a wave opens
/// - when a wave is complete and the next one may open
/// - which tasks are blocked by an upstream failure
///
/// It performs no IO; the executor feeds it completions.
#[derive(Debug)]
pub struct Scheduler {
    run_id: u64,
    waves: Waves,
    tasks: HashMap<TaskName, Arc<Task>>,
    deps: HashMap<TaskName, Vec<TaskName>>,
    states: HashMap<TaskName, RunState>,
    /// Index of the wave currently executing, `None` before start / after finish.
    current_wave: Option<usize>,
    started: bool,
    cancelled: bool,
}

impl Scheduler {
    /// Plan a run of `selected` plus its dependency closure.
    ///
    /// Fails before anything runs if a selected name is unknown or the
    /// closure contains a cycle.
    pub fn plan(
        run_id: u64,
        registry: &TaskRegistry,
        graph: &DagGraph,
        selected: &[TaskName],
    ) -> Result<Self> {
        let closure = graph.dependency_closure(selected.iter().map(String::as_str))?;
        let waves = graph.waves_for(&closure)?;

        let mut tasks = HashMap::new();
        let mut deps = HashMap::new();
        let mut states = HashMap::new();
        for name in &closure {
            let task = Arc::clone(registry.get(name)?);
            deps.insert(name.clone(), task.dependencies.iter().cloned().collect());
            tasks.insert(name.clone(), task);
            states.insert(name.clone(), RunState::Pending);
        }

        debug!(run_id, ?waves, "scheduler: planned run");

        Ok(Self {
            run_id,
            waves,
            tasks,
            deps,
            states,
            current_wave: None,
            started: false,
            cancelled: false,
        })
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn waves(&self) -> &Waves {
        &self.waves
    }

    pub fn current_wave(&self) -> Option<usize> {
        self.current_wave
    }

    pub fn state_of(&self, task: &str) -> Option<RunState> {
        self.states.get(task).copied()
    }

    /// True once every task in the run is terminal.
    pub fn is_finished(&self) -> bool {
        self.started && self.states.values().all(|s| s.is_terminal())
    }

    /// Open the first wave.
    pub fn start(&mut self) -> SchedulerStep {
        if self.started {
            warn!(run_id = self.run_id, "scheduler: start called twice; ignoring");
            return SchedulerStep::default();
        }
        self.started = true;
        info!(run_id = self.run_id, waves = self.waves.len(), "scheduler: starting run");
        self.advance(0)
    }

    /// Record the outcome of a dispatched task and open the next wave if the
    /// current one is complete.
    pub fn handle_completion(&mut self, task: &str, outcome: &TaskOutcome) -> SchedulerStep {
        let Some(state) = self.states.get_mut(task) else {
            warn!(task = %task, "completion for task outside this run; ignoring");
            return SchedulerStep::default();
        };

        if *state != RunState::Running {
            warn!(
                task = %task,
                state = ?*state,
                "completion for task that is not running; ignoring"
            );
            return SchedulerStep::default();
        }

        *state = match outcome {
            TaskOutcome::Succeeded => RunState::Succeeded,
            TaskOutcome::Skipped => RunState::Skipped,
            TaskOutcome::Failed(_) => RunState::Failed,
        };
        debug!(task = %task, run_id = self.run_id, ?outcome, "scheduler: task completed");

        match self.current_wave {
            Some(idx) if self.wave_done(idx) => self.advance(idx + 1),
            _ => SchedulerStep::default(),
        }
    }

    /// Stop opening new waves. Every pending task becomes blocked; running
    /// tasks are left for the executor to abort and report.
    pub fn cancel(&mut self) -> SchedulerStep {
        if self.cancelled {
            return SchedulerStep::default();
        }
        self.cancelled = true;
        info!(run_id = self.run_id, "scheduler: run cancelled");

        let mut step = SchedulerStep::default();
        for name in self.waves.iter().flatten() {
            if let Some(state) = self.states.get_mut(name) {
                if *state == RunState::Pending {
                    *state = RunState::Blocked;
                    step.newly_blocked.push((name.clone(), FailureReason::Cancelled));
                }
            }
        }

        if self.is_finished() {
            self.current_wave = None;
            step.run_just_finished = true;
        }
        step
    }

    fn wave_done(&self, idx: usize) -> bool {
        self.waves[idx]
            .iter()
            .all(|name| self.states.get(name).is_some_and(|s| s.is_terminal()))
    }

    /// Open waves starting at `from` until one has something running or the
    /// run is exhausted.
    fn advance(&mut self, from: usize) -> SchedulerStep {
        let mut step = SchedulerStep::default();
        let mut idx = from;

        while idx < self.waves.len() && !self.cancelled {
            self.current_wave = Some(idx);
            let wave = self.waves[idx].clone();

            for name in &wave {
                if let Some(upstream) = self.failed_dependency(name) {
                    debug!(task = %name, upstream = %upstream, "blocked by upstream failure");
                    self.states.insert(name.clone(), RunState::Blocked);
                    step.newly_blocked
                        .push((name.clone(), FailureReason::UpstreamFailure(upstream)));
                    continue;
                }

                let upstream_unchanged = self.deps[name]
                    .iter()
                    .all(|d| self.states.get(d) == Some(&RunState::Skipped));

                self.states.insert(name.clone(), RunState::Running);
                step.newly_scheduled.push(ScheduledTask {
                    task: Arc::clone(&self.tasks[name]),
                    run_id: self.run_id,
                    wave: idx,
                    upstream_unchanged,
                });
            }

            if !step.newly_scheduled.is_empty() {
                info!(
                    run_id = self.run_id,
                    wave = idx + 1,
                    tasks = ?step.newly_scheduled.iter().map(|t| t.name()).collect::<Vec<_>>(),
                    "scheduler: wave started"
                );
                return step;
            }

            idx += 1;
        }

        if self.is_finished() {
            info!(run_id = self.run_id, "scheduler: all tasks terminal; run finished");
            self.current_wave = None;
            step.run_just_finished = true;
        }
        step
    }

    /// First dependency (by name) that failed or was blocked in this run.
    fn failed_dependency(&self, task: &str) -> Option<TaskName> {
        let mut deps = self.deps.get(task)?.clone();
        deps.sort();
        deps.into_iter().find(|d| {
            self.states
                .get(d)
                .is_some_and(|s| s.is_unsuccessful())
        })
    }
}
