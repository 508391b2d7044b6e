// src/dag/mod.rs

//! Task graph: registration, resolution and per-run scheduling.
//!
//! - [`task`] defines a registered task and the dispatch descriptor.
//! - [`registry`] maps names to tasks and validates the closure.
//! - [`graph`] holds deps/dependents adjacency and closure walks.
//! - [`resolver`] turns a dependency map into ordered waves.
//! - [`scheduler`] is the per-run wave state machine.
//! - [`scheduler_step`] defines the result type for scheduler steps.

pub mod graph;
pub mod registry;
pub mod resolver;
pub mod scheduler;
pub mod scheduler_step;
pub mod task;

pub use graph::DagGraph;
pub use registry::TaskRegistry;
pub use resolver::{resolve_waves, Waves};
pub use scheduler::{RunState, Scheduler};
pub use scheduler_step::SchedulerStep;
pub use task::{ScheduledTask, Task};
