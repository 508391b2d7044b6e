// src/exec/mod.rs

//! Action execution layer.
//!
//! - [`action`] defines the `TaskAction` trait every task runs.
//! - [`command`] runs shell commands via `tokio::process::Command`.
//! - [`long_lived`] keeps server-like processes running across runs.
//! - [`builtin`] provides copy, clean and group actions.
//! - [`task_runner`] runs one scheduled task: fingerprint, skip or run,
//!   timeout, and reporting back via `RuntimeEvent`s.
//! - [`backend`] provides the `ExecutorBackend` trait and the concrete
//!   `ActionExecutorBackend` used in production, which tests can replace
//!   with a fake implementation.

pub mod action;
pub mod backend;
pub mod builtin;
pub mod command;
pub mod long_lived;
pub mod task_runner;

pub use action::{action_fn, ActionContext, ActionFuture, FnAction, TaskAction};
pub use backend::{ActionExecutorBackend, ExecutorBackend};
pub use builtin::{CleanAction, CopyAction, GroupAction};
pub use command::ShellAction;
pub use long_lived::{LongLivedAction, ProcessRegistry, Readiness};
