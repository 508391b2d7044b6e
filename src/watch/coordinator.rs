// src/watch/coordinator.rs

//! Turns a stream of file changes into debounced, targeted runs.
//!
//! ```text
//!  Idle --relevant change--> Debouncing --quiet for debounce--> Triggering
//!   ^                          |  ^  (each change resets timer)     |
//!   |                          +--+                                 |
//!   +-------------- run finished, nothing queued -------------------+
//!                  (changes queued during the run -> Debouncing)
//! ```

use std::collections::BTreeSet;
use std::future::Future;
use std::mem;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

use crate::engine::{Executor, RunSession, TaskName};
use crate::errors::Result;
use crate::exec::ExecutorBackend;
use crate::types::TriggerWhileRunningBehaviour;
use crate::watch::patterns::InputProfile;
use crate::watch::watcher::ChangeEvent;

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    Debouncing,
    Triggering,
}

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    pub debounce: Duration,
    pub behaviour: TriggerWhileRunningBehaviour,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(100),
            behaviour: TriggerWhileRunningBehaviour::Queue,
        }
    }
}

type SessionReporter = Box<dyn FnMut(&RunSession) + Send>;

pub struct WatchCoordinator<B: ExecutorBackend> {
    executor: Executor<B>,
    root: PathBuf,
    targets: Vec<TaskName>,
    /// Dependency closure of `targets`; only these tasks are ever triggered.
    target_closure: BTreeSet<TaskName>,
    profiles: Vec<InputProfile>,
    options: WatchOptions,
    state: WatchState,
    /// Changed root-relative paths waiting for the next cycle.
    pending: BTreeSet<String>,
    cycles: u64,
    reporter: Option<SessionReporter>,
}

impl<B: ExecutorBackend> std::fmt::Debug for WatchCoordinator<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchCoordinator")
            .field("root", &self.root)
            .field("targets", &self.targets)
            .field("state", &self.state)
            .field("pending", &self.pending)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl<B: ExecutorBackend> WatchCoordinator<B> {
    /// Watch the inputs of `targets` and everything they depend on.
    ///
    /// `root` is the directory input globs are relative to; change paths are
    /// expected below it.
    pub fn new(
        executor: Executor<B>,
        root: impl Into<PathBuf>,
        targets: Vec<TaskName>,
        options: WatchOptions,
    ) -> Result<Self> {
        let target_closure = executor
            .graph()
            .dependency_closure(targets.iter().map(String::as_str))?;

        let profiles = executor
            .registry()
            .all()
            .filter(|task| target_closure.contains(&task.name) && !task.inputs.is_empty())
            .map(|task| InputProfile::new(task.name.clone(), &task.inputs))
            .collect::<anyhow::Result<Vec<_>>>()?;

        info!(
            targets = ?targets,
            watched_tasks = profiles.len(),
            debounce = ?options.debounce,
            behaviour = ?options.behaviour,
            "watch coordinator ready"
        );

        Ok(Self {
            executor,
            root: root.into(),
            targets,
            target_closure,
            profiles,
            options,
            state: WatchState::Idle,
            pending: BTreeSet::new(),
            cycles: 0,
            reporter: None,
        })
    }

    /// Call `reporter` with the session of every finished run.
    pub fn with_reporter(mut self, reporter: impl FnMut(&RunSession) + Send + 'static) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Number of completed Triggering cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn executor(&self) -> &Executor<B> {
        &self.executor
    }

    /// Tasks to run for a set of changed root-relative paths: tasks whose
    /// inputs match, plus their transitive dependents inside the target
    /// closure.
    pub fn impacted_tasks<'a, I>(&self, rel_paths: I) -> BTreeSet<TaskName>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let paths: Vec<&str> = rel_paths.into_iter().collect();
        let direct: BTreeSet<&str> = self
            .profiles
            .iter()
            .filter(|p| paths.iter().any(|path| p.matches(path)))
            .map(|p| p.name())
            .collect();

        self.executor
            .graph()
            .dependents_closure(direct)
            .into_iter()
            .filter(|name| self.target_closure.contains(name))
            .collect()
    }

    /// Run the targets once, outside the watch loop.
    pub async fn run_targets(&mut self) -> Result<RunSession> {
        let targets = self.targets.clone();
        let session = self.executor.run(&targets).await?;
        self.report(&session);
        Ok(session)
    }

    /// Drive the state machine until `shutdown` resolves or the change
    /// channel closes (after finishing any pending cycle).
    ///
    /// Run failures and executor errors are logged; they never end the loop.
    pub async fn run<S>(&mut self, mut events: mpsc::Receiver<ChangeEvent>, shutdown: S) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut events_open = true;

        loop {
            match self.state {
                WatchState::Idle => {
                    if !events_open {
                        break;
                    }
                    tokio::select! {
                        event = events.recv() => match event {
                            Some(event) => {
                                if self.accept(&event) {
                                    self.state = WatchState::Debouncing;
                                }
                            }
                            None => events_open = false,
                        },
                        _ = &mut shutdown => break,
                    }
                }
                WatchState::Debouncing => {
                    let timer = sleep(self.options.debounce);
                    tokio::pin!(timer);
                    loop {
                        tokio::select! {
                            _ = &mut timer => break,
                            event = events.recv(), if events_open => match event {
                                Some(event) => {
                                    if self.accept(&event) {
                                        timer.as_mut().reset(Instant::now() + self.options.debounce);
                                    }
                                }
                                None => events_open = false,
                            },
                            _ = &mut shutdown => {
                                info!("shutdown requested while debouncing");
                                return Ok(());
                            }
                        }
                    }
                    self.state = WatchState::Triggering;
                }
                WatchState::Triggering => {
                    let stop = self
                        .trigger(&mut events, &mut events_open, shutdown.as_mut())
                        .await;
                    if stop {
                        info!("shutdown requested during run");
                        return Ok(());
                    }
                    self.state = if self.pending.is_empty() {
                        WatchState::Idle
                    } else {
                        WatchState::Debouncing
                    };
                }
            }
        }

        info!(cycles = self.cycles, "watch coordinator stopped");
        Ok(())
    }

    /// Record a change if it concerns a watched task.
    fn accept(&mut self, event: &ChangeEvent) -> bool {
        accept_change(&self.root, &self.profiles, &mut self.pending, event)
    }

    /// One Triggering cycle. Returns true if shutdown was requested.
    ///
    /// Changes arriving meanwhile are queued for the next cycle; in
    /// `cancel` mode they also cancel the in-flight run.
    async fn trigger<S>(
        &mut self,
        events: &mut mpsc::Receiver<ChangeEvent>,
        events_open: &mut bool,
        mut shutdown: Pin<&mut S>,
    ) -> bool
    where
        S: Future<Output = ()>,
    {
        let paths = mem::take(&mut self.pending);
        let selected: Vec<TaskName> = self
            .impacted_tasks(paths.iter().map(String::as_str))
            .into_iter()
            .collect();
        if selected.is_empty() {
            return false;
        }

        self.cycles += 1;
        let cycle = self.cycles;
        info!(cycle, changed = ?paths, tasks = ?selected, "running impacted tasks");

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let mut cancel_tx = Some(cancel_tx);
        let cancel = async move {
            if cancel_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        let mut stop = false;
        let result = {
            let Self {
                executor,
                root,
                profiles,
                pending,
                options,
                ..
            } = self;
            let run = executor.run_until_cancelled(&selected, cancel);
            tokio::pin!(run);

            loop {
                tokio::select! {
                    result = &mut run => break result,
                    event = events.recv(), if *events_open => match event {
                        Some(event) => {
                            let queued = accept_change(root, profiles, pending, &event);
                            if queued && options.behaviour == TriggerWhileRunningBehaviour::Cancel {
                                if let Some(tx) = cancel_tx.take() {
                                    info!(cycle, "new changes; cancelling in-flight run");
                                    let _ = tx.send(());
                                }
                            }
                        }
                        None => *events_open = false,
                    },
                    _ = shutdown.as_mut(), if !stop => {
                        stop = true;
                        if let Some(tx) = cancel_tx.take() {
                            let _ = tx.send(());
                        }
                    }
                }
            }
        };

        match result {
            Ok(session) => {
                info!(
                    cycle,
                    result = ?session.result(),
                    executed = ?session.executed(),
                    "triggered run finished"
                );
                self.report(&session);
            }
            Err(e) => error!(cycle, error = %e, "triggered run could not start"),
        }
        stop
    }

    fn report(&mut self, session: &RunSession) {
        if let Some(reporter) = self.reporter.as_mut() {
            reporter(session);
        }
    }
}

fn accept_change(
    root: &Path,
    profiles: &[InputProfile],
    pending: &mut BTreeSet<String>,
    event: &ChangeEvent,
) -> bool {
    let Some(rel) = relative_str(root, &event.path) else {
        debug!(path = ?event.path, "change outside project root; ignoring");
        return false;
    };
    if !profiles.iter().any(|p| p.matches(&rel)) {
        debug!(path = %rel, "change matches no task inputs; ignoring");
        return false;
    }
    debug!(path = %rel, kind = ?event.kind, "queued change");
    pending.insert(rel);
    true
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Falls back to canonicalizing both paths when a plain prefix strip fails
/// (e.g. `/private/var` vs `/var` on macOS).
fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(rel.to_string_lossy().replace('\\', "/"));
    }

    let root_canon = root.canonicalize().ok()?;
    let path_canon = path
        .canonicalize()
        .or_else(|_| {
            // Deleted files cannot be canonicalized; try their parent.
            let parent = path.parent().ok_or(())?.canonicalize().map_err(|_| ())?;
            Ok::<_, ()>(parent.join(path.file_name().ok_or(())?))
        })
        .ok()?;
    path_canon
        .strip_prefix(&root_canon)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
}
