//! # Resumable routines and their resumption directives.
//!
//! A [`Routine`] is the body of a task: an explicit step function plus
//! whatever local state it keeps between steps. There is no coroutine
//! underneath — suspension points are the [`Step`] directives a routine
//! returns, and the engine calls [`step`](Routine::step) again when the
//! directive comes due. Between directives a step runs to completion
//! uninterrupted, so steps should stay short: a long step stalls the whole
//! scheduling pass.
//!
//! [`RoutineFn`] wraps a closure `FnMut(&StepCtx) -> Result<Step, TaskError>`
//! for routines whose state fits naturally in captured variables.
//!
//! ## Example
//! ```
//! use cotick::{Routine, RoutineFn, Step, StepCtx, TaskError};
//!
//! let mut ticks = 0u32;
//! let mut routine = RoutineFn::new(move |cx: &StepCtx| {
//!     ticks += 1;
//!     if cx.count < 3 {
//!         Ok(Step::Sleep(0.5))
//!     } else {
//!         Ok(Step::Done)
//!     }
//! });
//!
//! let cx = StepCtx { time: 0.0, dtime: 0.0, count: 1 };
//! assert!(matches!(routine.step(&cx), Ok(Step::Sleep(_))));
//! ```

use crate::error::TaskError;
use crate::tasks::task::Task;

/// The view of a task's virtual clock presented to each resumption.
#[derive(Clone, Copy, Debug)]
pub struct StepCtx {
    /// Virtual time of this resumption, seconds since the task's epoch.
    ///
    /// During catch-up this is the nominal due time of the resumption, not
    /// the driver's wall instant, so a routine sleeping on `d` observes time
    /// advancing in exact multiples of `d`.
    pub time: f64,
    /// Seconds of virtual time since the previous resumption.
    pub dtime: f64,
    /// Number of resumptions so far, `1` on the first step.
    pub count: u64,
}

/// What a routine's step tells the engine to do next.
pub enum Step {
    /// Resume once virtual time has advanced by this many seconds from the
    /// time of this resumption.
    ///
    /// When the driver ticks slower than the delay, the engine resumes the
    /// routine once per elapsed multiple within a single `update()` call
    /// (deterministic catch-up). A non-positive delay degrades to
    /// [`Step::Tick`].
    Sleep(f64),

    /// Resume exactly once per external `update()` call, however much
    /// virtual time has passed.
    ///
    /// Use for per-frame work where a slow driver must not create simulated
    /// skips.
    Tick,

    /// Suspend until the given task finalizes, then resume within the same
    /// tick it finalizes (or immediately if it already has).
    ///
    /// The resumption after the join observes the wall instant of the wake;
    /// `dtime` spans the whole blocked wait. The blocked interval is never
    /// replayed through catch-up.
    Join(Task),

    /// The routine is complete; the task finalizes.
    Done,
}

/// A resumable unit of work driven by the engine.
pub trait Routine: 'static {
    /// Executes one step and reports when to resume next.
    ///
    /// An `Err` finalizes the task and surfaces from the manager's `update()`
    /// after housekeeping for this task completes.
    fn step(&mut self, cx: &StepCtx) -> Result<Step, TaskError>;
}

/// Function-backed routine implementation.
///
/// Wraps a closure; captured variables are the routine's saved local state.
pub struct RoutineFn<F> {
    f: F,
}

impl<F> RoutineFn<F>
where
    F: FnMut(&StepCtx) -> Result<Step, TaskError> + 'static,
{
    /// Creates a new function-backed routine.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the routine boxed, ready to hand to a task constructor.
    pub fn boxed(f: F) -> Box<dyn Routine> {
        Box::new(Self::new(f))
    }
}

impl<F> Routine for RoutineFn<F>
where
    F: FnMut(&StepCtx) -> Result<Step, TaskError> + 'static,
{
    fn step(&mut self, cx: &StepCtx) -> Result<Step, TaskError> {
        (self.f)(cx)
    }
}
