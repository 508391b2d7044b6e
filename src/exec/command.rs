// src/exec/command.rs

//! Shell command actions.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{bail, Context};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::exec::action::{ActionContext, ActionFuture, TaskAction};

/// Number of trailing stderr lines quoted in a failure message.
const STDERR_TAIL: usize = 5;

/// Build a shell command appropriate for the platform.
pub(crate) fn shell_command(cmd: &str, cwd: &Path) -> Command {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };
    command
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    command
}

/// Forward each line of a child stream to the log, returning the last few.
pub(crate) async fn forward_lines<R>(reader: Option<R>, task: &str, stream: &str) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);
    let Some(reader) = reader else {
        return Vec::new();
    };
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        info!(task = %task, stream, "{}", line);
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into()
}

/// Runs `cmd` through the platform shell in the project root.
/// A non-zero exit status fails the task.
#[derive(Debug, Clone)]
pub struct ShellAction {
    cmd: String,
    cwd: PathBuf,
}

impl ShellAction {
    pub fn new(cmd: impl Into<String>, cwd: PathBuf) -> Self {
        Self {
            cmd: cmd.into(),
            cwd,
        }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }
}

impl TaskAction for ShellAction {
    fn run(&self, ctx: ActionContext) -> ActionFuture<'_> {
        Box::pin(async move {
            debug!(task = %ctx.task, cmd = %self.cmd, inputs = ctx.inputs.len(), "starting shell command");

            let mut child = shell_command(&self.cmd, &self.cwd)
                .env("WAVEBUILD_TASK", &ctx.task)
                .spawn()
                .with_context(|| format!("spawning `{}`", self.cmd))?;

            let stdout = child.stdout.take();
            let stderr = child.stderr.take();

            let (status, _, stderr_tail) = tokio::join!(
                child.wait(),
                forward_lines(stdout, &ctx.task, "stdout"),
                forward_lines(stderr, &ctx.task, "stderr"),
            );
            let status = status.with_context(|| format!("waiting for `{}`", self.cmd))?;

            if !status.success() {
                let code = status
                    .code()
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "signal".to_string());
                match stderr_tail.last() {
                    Some(last) => bail!("`{}` exited with status {code}: {last}", self.cmd),
                    None => bail!("`{}` exited with status {code}", self.cmd),
                }
            }

            debug!(task = %ctx.task, "shell command finished");
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("sh: {}", self.cmd)
    }
}
