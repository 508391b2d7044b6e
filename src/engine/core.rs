// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated scheduler and session
//! - a list of commands describing what the IO shell should do next
//!
//! The async shell (`engine::executor::Executor`) is responsible for:
//! - reading events from the worker channel
//! - sending `ScheduledTask`s to the executor backend
//! - forwarding cancellation
//!
//! The core has no channels, no Tokio types, and does not perform any IO.

use crate::dag::{ScheduledTask, Scheduler, SchedulerStep};
use crate::engine::session::RunSession;
use crate::engine::RuntimeEvent;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Send these tasks to the executor backend.
    DispatchTasks(Vec<ScheduledTask>),
    /// Abort every in-flight action of this run.
    AbortRunning,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the run loop should keep waiting for events.
    pub keep_running: bool,
}

#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    session: RunSession,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        let session = RunSession::new(scheduler.run_id(), scheduler.waves());
        Self { scheduler, session }
    }

    pub fn session(&self) -> &RunSession {
        &self.session
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Open the first wave.
    pub fn start(&mut self) -> CoreStep {
        let step = self.scheduler.start();
        self.apply(step, Vec::new())
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskStarted { task } => {
                self.session.mark_running(&task);
                CoreStep {
                    commands: Vec::new(),
                    keep_running: !self.scheduler.is_finished(),
                }
            }
            RuntimeEvent::TaskCompleted { task, outcome } => {
                self.session.mark_finished(&task, &outcome);
                let step = self.scheduler.handle_completion(&task, &outcome);
                self.apply(step, Vec::new())
            }
            RuntimeEvent::CancelRequested => {
                let step = self.scheduler.cancel();
                self.apply(step, vec![CoreCommand::AbortRunning])
            }
        }
    }

    /// Consume the core, returning the finished session.
    pub fn into_session(mut self) -> RunSession {
        self.session.finish();
        self.session
    }

    fn apply(&mut self, step: SchedulerStep, mut commands: Vec<CoreCommand>) -> CoreStep {
        for (task, reason) in step.newly_blocked {
            self.session.mark_blocked(&task, reason);
        }

        if !step.newly_scheduled.is_empty() {
            commands.push(CoreCommand::DispatchTasks(step.newly_scheduled));
        }

        CoreStep {
            commands,
            keep_running: !self.scheduler.is_finished(),
        }
    }
}
