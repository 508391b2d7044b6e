// src/exec/task_runner.rs

//! Runs one scheduled task: fingerprint, skip or run the action, record.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, error, info, warn};

use crate::dag::{ScheduledTask, Task};
use crate::engine::{FailureReason, RuntimeEvent, TaskOutcome};
use crate::exec::action::ActionContext;
use crate::fingerprint::{Fingerprint, Fingerprinter};
use crate::watch::patterns::{missing_outputs, InputProfile};

/// Shared state every task worker needs.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// One permit per concurrent task; non-parallel tasks take all of them.
    pub slots: Arc<Semaphore>,
    pub jobs: u32,
    /// Ignore stored fingerprints and run everything.
    pub force: bool,
    pub fingerprints: Arc<Fingerprinter>,
}

/// Run a single scheduled task and report its outcome as
/// `RuntimeEvent::TaskCompleted`.
///
/// If the cancel channel fires, the action future is dropped (killing any
/// child process), the stored fingerprint is cleared and the task completes
/// as `Failed(Cancelled)`.
pub async fn run_task(
    ctx: WorkerContext,
    scheduled: ScheduledTask,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    cancel_rx: oneshot::Receiver<()>,
) {
    let name = scheduled.name().to_string();
    let run_id = scheduled.run_id;

    let cancelled = async {
        // A dropped sender means the backend went away, not a cancel request.
        if cancel_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let outcome = tokio::select! {
        outcome = execute(&ctx, &scheduled, &runtime_tx) => outcome,
        _ = cancelled => {
            info!(task = %name, run_id, "cancellation requested; aborting task");
            TaskOutcome::Failed(FailureReason::Cancelled)
        }
    };

    // The action was interrupted, so its outputs may be half written.
    if matches!(outcome, TaskOutcome::Failed(FailureReason::Cancelled)) {
        forget_fingerprint(&ctx, &scheduled.task).await;
    }

    if let Err(e) = runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: name.clone(),
            outcome,
        })
        .await
    {
        debug!(task = %name, run_id, error = %e, "run loop gone; dropping completion");
    }
}

async fn execute(
    ctx: &WorkerContext,
    scheduled: &ScheduledTask,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> TaskOutcome {
    let task = &scheduled.task;
    let permits = if task.parallel { 1 } else { ctx.jobs };
    let _permit = match Arc::clone(&ctx.slots).acquire_many_owned(permits).await {
        Ok(permit) => permit,
        Err(_) => {
            return TaskOutcome::Failed(FailureReason::Action("worker pool closed".to_string()));
        }
    };

    if let Err(e) = runtime_tx
        .send(RuntimeEvent::TaskStarted {
            task: task.name.clone(),
        })
        .await
    {
        debug!(
            task = %task.name,
            run_id = scheduled.run_id,
            error = %e,
            "run loop gone; dropping start"
        );
    }

    let fingerprint = if task.action.always_run() {
        None
    } else {
        fingerprint_inputs(ctx, task).await
    };

    if let Some(fp) = &fingerprint {
        if !ctx.force && scheduled.upstream_unchanged && stored_matches(ctx, task, fp).await {
            info!(task = %task.name, run_id = scheduled.run_id, "inputs unchanged; skipping");
            return TaskOutcome::Skipped;
        }
    }

    info!(
        task = %task.name,
        run_id = scheduled.run_id,
        wave = scheduled.wave,
        action = %task.action.describe(),
        "running task"
    );
    let started = Instant::now();

    let action_ctx = ActionContext {
        task: task.name.clone(),
        root: ctx.fingerprints.root().to_path_buf(),
        inputs: fingerprint.as_ref().map(|f| f.inputs.clone()).unwrap_or_default(),
        outputs: task.outputs.clone(),
        fs: Arc::clone(ctx.fingerprints.fs()),
    };

    let run = task.action.run(action_ctx);
    let result = match task.timeout {
        Some(limit) => match tokio::time::timeout(limit, run).await {
            Ok(result) => result,
            Err(_) => {
                error!(task = %task.name, ?limit, "task timed out");
                forget_fingerprint(ctx, task).await;
                return TaskOutcome::Failed(FailureReason::Timeout(limit));
            }
        },
        None => run.await,
    };

    match result {
        Ok(()) => {
            info!(task = %task.name, elapsed = ?started.elapsed(), "task succeeded");
            warn_missing_outputs(ctx, task).await;
            if let Some(fp) = fingerprint {
                record_fingerprint(ctx, task, fp.digest).await;
            }
            TaskOutcome::Succeeded
        }
        Err(e) => {
            error!(task = %task.name, error = %format!("{e:#}"), "task failed");
            forget_fingerprint(ctx, task).await;
            TaskOutcome::Failed(FailureReason::Action(format!("{e:#}")))
        }
    }
}

/// Fingerprint the task's inputs and upstream digests. Tasks whose inputs
/// cannot be read get `None` and always run.
async fn fingerprint_inputs(ctx: &WorkerContext, task: &Arc<Task>) -> Option<Fingerprint> {
    let fingerprints = Arc::clone(&ctx.fingerprints);
    let task_ref = Arc::clone(task);
    let computed = tokio::task::spawn_blocking(move || {
        let profile = InputProfile::new(task_ref.name.clone(), &task_ref.inputs)?;
        fingerprints.compute_task(&profile, &task_ref.dependencies)
    })
    .await;

    match computed {
        Ok(Ok(fp)) => {
            debug!(task = %task.name, files = fp.inputs.len(), digest = %fp.digest, "computed fingerprint");
            Some(fp)
        }
        Ok(Err(e)) => {
            warn!(task = %task.name, error = %format!("{e:#}"), "could not fingerprint inputs; task will run");
            None
        }
        Err(e) => {
            warn!(task = %task.name, error = %e, "fingerprint worker failed; task will run");
            None
        }
    }
}

async fn stored_matches(ctx: &WorkerContext, task: &Arc<Task>, fp: &Fingerprint) -> bool {
    let fingerprints = Arc::clone(&ctx.fingerprints);
    let name = task.name.clone();
    match tokio::task::spawn_blocking(move || fingerprints.stored(&name)).await {
        Ok(Ok(stored)) => stored.as_deref() == Some(fp.digest.as_str()),
        Ok(Err(e)) => {
            warn!(task = %task.name, error = %format!("{e:#}"), "could not read stored fingerprint");
            false
        }
        Err(_) => false,
    }
}

async fn record_fingerprint(ctx: &WorkerContext, task: &Arc<Task>, digest: String) {
    let fingerprints = Arc::clone(&ctx.fingerprints);
    let name = task.name.clone();
    let saved = tokio::task::spawn_blocking(move || fingerprints.record(&name, &digest)).await;
    if let Ok(Err(e)) = saved {
        warn!(task = %task.name, error = %format!("{e:#}"), "could not store fingerprint");
    }
}

async fn forget_fingerprint(ctx: &WorkerContext, task: &Arc<Task>) {
    let fingerprints = Arc::clone(&ctx.fingerprints);
    let name = task.name.clone();
    let forgotten = tokio::task::spawn_blocking(move || fingerprints.forget(&name)).await;
    if let Ok(Err(e)) = forgotten {
        warn!(task = %task.name, error = %format!("{e:#}"), "could not clear fingerprint");
    }
}

async fn warn_missing_outputs(ctx: &WorkerContext, task: &Arc<Task>) {
    if task.outputs.is_empty() {
        return;
    }
    let fingerprints = Arc::clone(&ctx.fingerprints);
    let outputs = task.outputs.clone();
    let missing = tokio::task::spawn_blocking(move || {
        missing_outputs(fingerprints.fs().as_ref(), fingerprints.root(), &outputs)
    })
    .await
    .unwrap_or_default();

    if !missing.is_empty() {
        warn!(task = %task.name, ?missing, "task succeeded but declared outputs are missing");
    }
}
