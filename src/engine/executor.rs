// src/engine/executor.rs

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::{DagGraph, ScheduledTask, Scheduler, TaskRegistry, Waves};
use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::session::RunSession;
use super::{CoreCommand, RuntimeEvent, TaskName};

/// Capacity of the per-run worker event channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Runs selected tasks plus their dependency closure, wave by wave.
///
/// This is the async IO shell around [`CoreRuntime`], which holds all run
/// semantics. The executor reads worker events, feeds them into the core and
/// hands dispatched tasks to an [`ExecutorBackend`].
///
/// Runs are sequential: one `&mut self` call at a time.
pub struct Executor<B: ExecutorBackend> {
    registry: Arc<TaskRegistry>,
    graph: DagGraph,
    backend: B,
    run_counter: u64,
    last_session: Option<RunSession>,
}

impl<B: ExecutorBackend> fmt::Debug for Executor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("tasks", &self.registry.len())
            .field("run_counter", &self.run_counter)
            .finish_non_exhaustive()
    }
}

impl<B: ExecutorBackend> Executor<B> {
    /// Validate the registry (unknown dependencies, cycles) and build an
    /// executor over it.
    pub fn new(registry: Arc<TaskRegistry>, backend: B) -> Result<Self> {
        let graph = registry.validate()?;
        Ok(Self {
            registry,
            graph,
            backend,
            run_counter: 0,
            last_session: None,
        })
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn graph(&self) -> &DagGraph {
        &self.graph
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Session of the most recent run, if any.
    pub fn last_session(&self) -> Option<&RunSession> {
        self.last_session.as_ref()
    }

    /// Waves that `run(selected)` would execute, without running anything.
    pub fn plan(&self, selected: &[TaskName]) -> Result<Waves> {
        let closure = self
            .graph
            .dependency_closure(selected.iter().map(String::as_str))?;
        self.graph.waves_for(&closure)
    }

    /// Run `selected` and everything it depends on.
    ///
    /// Graph errors (unknown task, cycle) are returned before any action
    /// runs. Task failures are not errors: they are recorded in the returned
    /// session.
    pub async fn run(&mut self, selected: &[TaskName]) -> Result<RunSession> {
        self.run_until_cancelled(selected, std::future::pending::<()>())
            .await
    }

    /// Like [`run`](Self::run), but stops early when `cancel` resolves:
    /// pending tasks become blocked and in-flight actions are aborted.
    pub async fn run_until_cancelled<C>(
        &mut self,
        selected: &[TaskName],
        cancel: C,
    ) -> Result<RunSession>
    where
        C: Future<Output = ()>,
    {
        self.run_counter += 1;
        let run_id = self.run_counter;
        let scheduler = Scheduler::plan(run_id, &self.registry, &self.graph, selected)?;
        info!(
            run_id,
            ?selected,
            waves = scheduler.waves().len(),
            "starting run"
        );

        let mut core = CoreRuntime::new(scheduler);
        let (events_tx, mut events_rx) = mpsc::channel::<RuntimeEvent>(EVENT_CHANNEL_CAPACITY);

        let step = core.start();
        let mut keep_running = step.keep_running;
        for command in step.commands {
            self.execute_command(command, &events_tx).await?;
        }

        tokio::pin!(cancel);
        let mut cancel_seen = false;

        while keep_running {
            let event = tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => event,
                    None => {
                        warn!(run_id, "worker event channel closed mid-run");
                        break;
                    }
                },
                _ = &mut cancel, if !cancel_seen => {
                    cancel_seen = true;
                    info!(run_id, "run cancelled");
                    RuntimeEvent::CancelRequested
                }
            };

            debug!(run_id, ?event, "executor received event");
            let step = core.step(event);
            for command in step.commands {
                self.execute_command(command, &events_tx).await?;
            }
            keep_running = step.keep_running;
        }

        let session = core.into_session();
        if !session.is_complete() {
            warn!(run_id, "run ended with tasks still pending or running");
        }
        let counts = session.counts();
        info!(
            run_id,
            succeeded = counts.succeeded,
            skipped = counts.skipped,
            failed = counts.failed,
            blocked = counts.blocked,
            elapsed = ?session.elapsed(),
            "run finished"
        );
        self.last_session = Some(session.clone());
        Ok(session)
    }

    async fn execute_command(
        &mut self,
        command: CoreCommand,
        events_tx: &mpsc::Sender<RuntimeEvent>,
    ) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => self.dispatch(tasks, events_tx).await,
            CoreCommand::AbortRunning => {
                self.backend.abort_running();
                Ok(())
            }
        }
    }

    async fn dispatch(
        &mut self,
        tasks: Vec<ScheduledTask>,
        events_tx: &mpsc::Sender<RuntimeEvent>,
    ) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name()).collect();
        debug!(?names, wave = tasks[0].wave, "dispatching tasks");

        if let Err(e) = self.backend.spawn_ready_tasks(tasks, events_tx.clone()).await {
            self.backend.abort_running();
            return Err(e);
        }
        Ok(())
    }
}
