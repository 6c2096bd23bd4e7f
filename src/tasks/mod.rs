//! # Task abstractions.
//!
//! This module provides the core task-related types:
//! - [`Task`] - resumable unit of cooperative work (clonable handle)
//! - [`TaskState`] - lifecycle state (Active / Suspended / Finalized)
//! - [`Routine`] - trait for implementing resumable routines
//! - [`RoutineFn`] - function-backed routine implementation
//! - [`Step`] - resumption directives a routine yields
//! - [`StepCtx`] - per-resumption view of the task's virtual clock

mod routine;
mod task;

pub use routine::{Routine, RoutineFn, Step, StepCtx};
pub use task::{Task, TaskState};

pub(crate) use task::Poll;
