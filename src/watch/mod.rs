// src/watch/mod.rs

//! File watching and change-driven re-runs.
//!
//! - [`patterns`] compiles per-task input globs and resolves them to files.
//! - [`watcher`] wires up a cross-platform filesystem watcher (`notify`)
//!   that emits [`ChangeEvent`]s into a bounded channel.
//! - [`coordinator`] debounces those events, maps them to impacted tasks
//!   and hands them to the executor.

pub mod coordinator;
pub mod patterns;
pub mod watcher;

pub use coordinator::{WatchCoordinator, WatchOptions, WatchState};
pub use patterns::{collect_matching_files, InputFile, InputProfile};
pub use watcher::{spawn_watcher, ChangeEvent, ChangeKind, WatcherHandle};
