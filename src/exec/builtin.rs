// src/exec/builtin.rs

//! Actions that need no external command: copy, clean and group.

use std::io::Read;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};

use crate::exec::action::{ActionContext, ActionFuture, TaskAction};

/// Reject absolute paths and `..` so builtins never touch anything outside
/// the project root.
fn project_path(root: &Path, rel: &str) -> Result<PathBuf> {
    let rel_path = Path::new(rel);
    let escapes = rel_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if rel.trim().is_empty() || escapes {
        bail!("path `{rel}` must be relative to the project root and stay inside it");
    }
    Ok(root.join(rel_path))
}

/// Copies every input file into each destination directory, keeping its
/// path relative to the glob base (or to `base`, when given).
#[derive(Debug, Clone)]
pub struct CopyAction {
    dest: Vec<String>,
    base: Option<String>,
}

impl CopyAction {
    pub fn new(dest: Vec<String>, base: Option<String>) -> Self {
        Self { dest, base }
    }

    fn copy_all(&self, ctx: &ActionContext) -> Result<usize> {
        let dests = self
            .dest
            .iter()
            .map(|d| project_path(&ctx.root, d))
            .collect::<Result<Vec<_>>>()?;
        let base = self.base.as_deref().map(|b| ctx.root.join(b));

        let mut copied = 0;
        for input in &ctx.inputs {
            let relative = match &base {
                Some(base) => input.path.strip_prefix(base).map_err(|_| {
                    anyhow!("input {:?} is not below copy base {:?}", input.path, base)
                })?,
                None => input.relative.as_path(),
            };

            let mut contents = Vec::new();
            ctx.fs
                .open_read(&input.path)?
                .read_to_end(&mut contents)
                .with_context(|| format!("reading {:?}", input.path))?;

            for dest in &dests {
                let target = dest.join(relative);
                debug!(task = %ctx.task, from = ?input.path, to = ?target, "copy");
                ctx.fs.write(&target, &contents)?;
                copied += 1;
            }
        }
        Ok(copied)
    }
}

impl TaskAction for CopyAction {
    fn run(&self, ctx: ActionContext) -> ActionFuture<'_> {
        let this = self.clone();
        Box::pin(async move {
            let task = ctx.task.clone();
            let copied = tokio::task::spawn_blocking(move || this.copy_all(&ctx))
                .await
                .context("copy worker panicked")??;
            info!(task = %task, files = copied, "copied files");
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("copy -> {}", self.dest.join(", "))
    }
}

/// Removes the listed files or directories. Missing paths are fine.
#[derive(Debug, Clone)]
pub struct CleanAction {
    paths: Vec<String>,
}

impl CleanAction {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }

    fn clean_all(&self, ctx: &ActionContext) -> Result<()> {
        for rel in &self.paths {
            let path = project_path(&ctx.root, rel)?;
            debug!(task = %ctx.task, path = ?path, "remove");
            ctx.fs.remove(&path)?;
        }
        Ok(())
    }
}

impl TaskAction for CleanAction {
    fn run(&self, ctx: ActionContext) -> ActionFuture<'_> {
        let this = self.clone();
        Box::pin(async move {
            let task = ctx.task.clone();
            tokio::task::spawn_blocking(move || this.clean_all(&ctx))
                .await
                .context("clean worker panicked")??;
            info!(task = %task, paths = ?self.paths, "cleaned");
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("clean {}", self.paths.join(", "))
    }
}

/// Does nothing; the task only exists to aggregate its dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupAction;

impl TaskAction for GroupAction {
    fn run(&self, _ctx: ActionContext) -> ActionFuture<'_> {
        Box::pin(async { Ok(()) })
    }

    fn describe(&self) -> String {
        "group".to_string()
    }
}
