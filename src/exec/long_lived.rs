// src/exec/long_lived.rs

//! Long-lived processes (dev servers, watchers of other tools).
//!
//! A long-lived task's action returns once the process is *ready*, not when
//! it exits. The process itself is parked in a [`ProcessRegistry`] and keeps
//! running across runs until the registry is shut down.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Context};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::engine::TaskName;
use crate::exec::action::{ActionContext, ActionFuture, TaskAction};
use crate::exec::command::{forward_lines, shell_command};
use crate::types::parse_duration;

/// When a freshly spawned long-lived process counts as ready.
///
/// With neither a pattern nor a delay the process is ready as soon as it
/// has been spawned. With both, whichever happens first wins.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    pattern: Option<Regex>,
    after: Option<Duration>,
}

impl Readiness {
    pub fn from_config(
        ready_on_stdout: Option<&str>,
        ready_after: Option<&str>,
    ) -> Result<Self, String> {
        let pattern = ready_on_stdout
            .map(|p| Regex::new(p).map_err(|e| format!("invalid ready_on_stdout regex `{p}`: {e}")))
            .transpose()?;
        let after = ready_after.map(parse_duration).transpose()?;
        Ok(Self { pattern, after })
    }

    pub fn is_immediate(&self) -> bool {
        self.pattern.is_none() && self.after.is_none()
    }

    fn matches(&self, line: &str) -> bool {
        self.pattern.as_ref().is_some_and(|re| re.is_match(line))
    }
}

/// Processes started by long-lived tasks, keyed by task name.
#[derive(Debug, Default)]
pub struct ProcessRegistry {
    children: Mutex<HashMap<TaskName, Child>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskName, Child>> {
        self.children.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// True if the task's process is still alive. Exited processes are
    /// forgotten so the next run starts them again.
    pub fn is_running(&self, task: &str) -> bool {
        let mut children = self.lock();
        let Some(child) = children.get_mut(task) else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                info!(task = %task, %status, "long-lived process has exited");
                children.remove(task);
                false
            }
            Err(e) => {
                warn!(task = %task, error = %e, "could not poll long-lived process");
                children.remove(task);
                false
            }
        }
    }

    /// Names of tasks whose processes are currently parked here.
    pub fn running(&self) -> Vec<TaskName> {
        let mut names: Vec<_> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn insert(&self, task: TaskName, child: Child) {
        self.lock().insert(task, child);
    }

    /// Kill every parked process and wait for it to exit.
    pub async fn shutdown(&self) {
        let children: Vec<(TaskName, Child)> = self.lock().drain().collect();
        for (task, mut child) in children {
            info!(task = %task, "stopping long-lived process");
            if let Err(e) = child.kill().await {
                warn!(task = %task, error = %e, "failed to kill long-lived process");
            }
        }
    }
}

/// Starts `cmd` once and keeps it running; later runs find it alive and
/// succeed immediately.
#[derive(Debug)]
pub struct LongLivedAction {
    cmd: String,
    cwd: PathBuf,
    readiness: Readiness,
    processes: Arc<ProcessRegistry>,
}

impl LongLivedAction {
    pub fn new(
        cmd: impl Into<String>,
        cwd: PathBuf,
        readiness: Readiness,
        processes: Arc<ProcessRegistry>,
    ) -> Self {
        Self {
            cmd: cmd.into(),
            cwd,
            readiness,
            processes,
        }
    }
}

impl TaskAction for LongLivedAction {
    fn run(&self, ctx: ActionContext) -> ActionFuture<'_> {
        Box::pin(async move {
            let task = ctx.task;
            if self.processes.is_running(&task) {
                debug!(task = %task, "long-lived process already running");
                return Ok(());
            }

            info!(task = %task, cmd = %self.cmd, "starting long-lived process");
            let mut child = shell_command(&self.cmd, &self.cwd)
                .env("WAVEBUILD_TASK", &task)
                .spawn()
                .with_context(|| format!("spawning `{}`", self.cmd))?;

            if let Some(stderr) = child.stderr.take() {
                let name = task.clone();
                tokio::spawn(async move {
                    forward_lines(Some(stderr), &name, "stderr").await;
                });
            }

            let mut lines = child.stdout.take().map(|s| BufReader::new(s).lines());
            wait_until_ready(&mut child, &mut lines, &self.readiness, &task).await?;

            if let Some(mut lines) = lines {
                let name = task.clone();
                tokio::spawn(async move {
                    while let Ok(Some(line)) = lines.next_line().await {
                        info!(task = %name, stream = "stdout", "{}", line);
                    }
                });
            }

            info!(task = %task, "long-lived process is ready");
            self.processes.insert(task, child);
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("long-lived sh: {}", self.cmd)
    }

    // A stored fingerprint says nothing about whether the process is up.
    fn always_run(&self) -> bool {
        true
    }
}

async fn next_line(lines: &mut Option<Lines<BufReader<ChildStdout>>>) -> Option<String> {
    match lines {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => std::future::pending().await,
    }
}

async fn wait_until_ready(
    child: &mut Child,
    lines: &mut Option<Lines<BufReader<ChildStdout>>>,
    readiness: &Readiness,
    task: &str,
) -> anyhow::Result<()> {
    if readiness.is_immediate() {
        return Ok(());
    }

    let delay = readiness.after;
    let deadline = async move {
        match delay {
            Some(d) => sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut stdout_open = lines.is_some();
    loop {
        tokio::select! {
            _ = &mut deadline => {
                debug!(task = %task, "ready_after elapsed");
                return Ok(());
            }
            status = child.wait() => {
                let status = status.context("waiting for long-lived process")?;
                bail!("process exited with {status} before becoming ready");
            }
            line = next_line(lines), if stdout_open => match line {
                Some(line) => {
                    info!(task = %task, stream = "stdout", "{}", line);
                    if readiness.matches(&line) {
                        debug!(task = %task, "stdout matched ready_on_stdout");
                        return Ok(());
                    }
                }
                None => stdout_open = false,
            },
        }
    }
}
