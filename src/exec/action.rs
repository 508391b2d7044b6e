// src/exec/action.rs

//! The unit of work a task performs.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use crate::engine::TaskName;
use crate::fs::FileSystem;
use crate::watch::patterns::InputFile;

/// Boxed future returned by [`TaskAction::run`].
pub type ActionFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

/// Everything an action gets to see about the task it runs for.
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub task: TaskName,
    /// Project root; relative paths resolve against it.
    pub root: PathBuf,
    /// Files currently matched by the task's input globs, sorted by path.
    pub inputs: Vec<InputFile>,
    /// Declared outputs, as written in the config.
    pub outputs: Vec<String>,
    pub fs: Arc<dyn FileSystem>,
}

/// An opaque unit of work: succeeds or fails with a message.
///
/// Dropping the returned future must abort the work; timeouts and
/// cancellation rely on it.
pub trait TaskAction: Send + Sync {
    fn run(&self, ctx: ActionContext) -> ActionFuture<'_>;

    /// One-line human description, used by `list` and debug output.
    fn describe(&self) -> String;

    /// Run even when the task's fingerprint is unchanged.
    fn always_run(&self) -> bool {
        false
    }
}

/// Adapter turning an async closure into a [`TaskAction`].
pub struct FnAction<F> {
    label: String,
    f: F,
}

impl<F, Fut> FnAction<F>
where
    F: Fn(ActionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    pub fn new(label: impl Into<String>, f: F) -> Self {
        Self {
            label: label.into(),
            f,
        }
    }
}

impl<F, Fut> TaskAction for FnAction<F>
where
    F: Fn(ActionContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn run(&self, ctx: ActionContext) -> ActionFuture<'_> {
        Box::pin((self.f)(ctx))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Shorthand for `Arc::new(FnAction::new(label, f))`.
pub fn action_fn<F, Fut>(label: impl Into<String>, f: F) -> Arc<dyn TaskAction>
where
    F: Fn(ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnAction::new(label, f))
}
