// src/exec/backend.rs

//! Pluggable executor backend abstraction.
//!
//! The executor talks to an `ExecutorBackend` instead of spawning work
//! itself. This makes it easy to swap in a fake backend in tests while
//! keeping the production implementation here.
//!
//! - [`ActionExecutorBackend`] runs each task's [`TaskAction`] on its own
//!   Tokio task, bounded by a semaphore of `jobs` permits.
//! - Tests can provide their own `ExecutorBackend` that, for example, records
//!   which tasks were scheduled and directly emits `TaskCompleted` events.
//!
//! [`TaskAction`]: crate::exec::action::TaskAction

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskName};
use crate::errors::Result;
use crate::exec::task_runner::{run_task, WorkerContext};
use crate::fingerprint::Fingerprinter;

/// Trait abstracting how scheduled tasks are executed.
///
/// Every dispatched task must eventually produce exactly one
/// `RuntimeEvent::TaskCompleted` on `events` (a preceding `TaskStarted` is
/// optional).
pub trait ExecutorBackend: Send {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Ask every in-flight task to stop. Each still reports a completion.
    fn abort_running(&mut self) {}
}

/// Internal handle for a currently-running task.
struct ActiveTask {
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// Production backend: runs task actions with bounded parallelism.
pub struct ActionExecutorBackend {
    worker: WorkerContext,
    active: HashMap<TaskName, ActiveTask>,
}

impl std::fmt::Debug for ActionExecutorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionExecutorBackend")
            .field("jobs", &self.worker.jobs)
            .field("force", &self.worker.force)
            .field("active", &self.active.len())
            .finish()
    }
}

impl ActionExecutorBackend {
    /// `jobs` is the maximum number of concurrently running actions
    /// (clamped to at least 1).
    pub fn new(fingerprints: Arc<Fingerprinter>, jobs: usize) -> Self {
        let jobs = jobs.clamp(1, Semaphore::MAX_PERMITS.min(u32::MAX as usize)) as u32;
        Self {
            worker: WorkerContext {
                slots: Arc::new(Semaphore::new(jobs as usize)),
                jobs,
                force: false,
                fingerprints,
            },
            active: HashMap::new(),
        }
    }

    /// Run every task regardless of stored fingerprints.
    pub fn with_force(mut self, force: bool) -> Self {
        self.worker.force = force;
        self
    }

    pub fn jobs(&self) -> usize {
        self.worker.jobs as usize
    }

    pub fn fingerprints(&self) -> &Arc<Fingerprinter> {
        &self.worker.fingerprints
    }

    fn spawn_one(&mut self, task: ScheduledTask, events: mpsc::Sender<RuntimeEvent>) {
        self.active.retain(|_, t| !t.handle.is_finished());

        let name = task.name().to_string();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let worker = self.worker.clone();
        let spawn_name = name.clone();

        let handle = tokio::spawn(async move {
            run_task(worker, task, events, cancel_rx).await;
            debug!(task = %spawn_name, "task runner future finished");
        });

        self.active.insert(
            name,
            ActiveTask {
                cancel: Some(cancel_tx),
                handle,
            },
        );
    }
}

impl ExecutorBackend for ActionExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
        events: mpsc::Sender<RuntimeEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for task in tasks {
                self.spawn_one(task, events.clone());
            }
            Ok(())
        })
    }

    fn abort_running(&mut self) {
        for (name, active) in self.active.iter_mut() {
            if active.handle.is_finished() {
                continue;
            }
            if let Some(cancel) = active.cancel.take() {
                info!(task = %name, "cancelling running task");
                if cancel.send(()).is_err() {
                    debug!(task = %name, "task already finished while cancelling");
                }
            }
        }
    }
}
