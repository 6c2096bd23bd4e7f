//! Error types used by the cotick engine and task routines.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — errors raised by the scheduling engine itself.
//! - [`TaskError`] — errors raised by individual task routines.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging
//! and metrics. A routine error is never swallowed by the engine: the faulting
//! task is finalized (its finished signal fires, so dependents are woken) and
//! the error then surfaces from [`TaskManager::update`](crate::TaskManager::update)
//! as [`RuntimeError::TaskFaulted`], terminating the current scheduling pass.

use thiserror::Error;

/// # Errors produced by the scheduling engine.
///
/// These represent contract violations and surfaced task faults, not errors
/// of the engine's own bookkeeping (which is infallible by construction).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A finalized task was asked to resume.
    ///
    /// Finalized is terminal; a resume attempt indicates a dangling reference
    /// to a dead unit of work and is reported rather than silently ignored.
    #[error("task `{task}` is already finalized; resume is not allowed")]
    ResumeFinalized {
        /// Name of the finalized task.
        task: String,
    },

    /// A task routine raised while resuming.
    ///
    /// The task has already been finalized and detached when this is
    /// returned; the caller decides whether to keep ticking or shut down.
    #[error("task `{task}` faulted: {source}")]
    TaskFaulted {
        /// Name of the faulting task.
        task: String,
        /// The routine error.
        source: TaskError,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use cotick::RuntimeError;
    ///
    /// let err = RuntimeError::ResumeFinalized { task: "demo".into() };
    /// assert_eq!(err.as_label(), "resume_finalized");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::ResumeFinalized { .. } => "resume_finalized",
            RuntimeError::TaskFaulted { .. } => "task_faulted",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::ResumeFinalized { task } => {
                format!("resume on finalized task `{task}`")
            }
            RuntimeError::TaskFaulted { task, source } => {
                format!("task `{task}` faulted: {}", source.as_message())
            }
        }
    }
}

/// # Errors produced by task routines.
///
/// A routine reports failure by returning one of these from its step; the
/// engine finalizes the task and re-raises the error to the driver.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Ordinary failure; the unit of work did not complete.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Non-recoverable failure; the host should not re-submit this work.
    #[error("fatal error: {error}")]
    Fatal {
        /// The underlying error message.
        error: String,
    },
}

impl TaskError {
    /// Convenience constructor for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail { error: error.into() }
    }

    /// Convenience constructor for [`TaskError::Fatal`].
    pub fn fatal(error: impl Into<String>) -> Self {
        TaskError::Fatal { error: error.into() }
    }

    /// Returns `true` for errors the host must not retry.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TaskError::Fatal { .. })
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Fatal { .. } => "task_fatal",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Fatal { error } => format!("fatal: {error}"),
        }
    }
}
