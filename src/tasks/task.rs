//! # Task — a resumable unit of cooperative work.
//!
//! A [`Task`] is a clonable handle around a [`Routine`] plus the bookkeeping
//! the engine needs to drive it: a virtual clock anchored at the task's
//! epoch, a resumption point, a lifecycle state and a finished [`Signal`].
//!
//! ## Lifecycle
//! ```text
//!          ┌────────┐  suspend()   ┌───────────┐
//!  new ──► │ Active │ ───────────► │ Suspended │
//!          │        │ ◄─────────── │           │
//!          └───┬────┘   resume()   └─────┬─────┘
//!              │ routine returns Done,   │ remove() /
//!              │ errors, or remove()     │ routine error
//!              ▼                         ▼
//!          ┌───────────────────────────────────┐
//!          │ Finalized (terminal):             │
//!          │ finalizer ran, finished fired     │
//!          └───────────────────────────────────┘
//! ```
//!
//! Finalized is terminal. `resume()` on a finalized task is
//! [`RuntimeError::ResumeFinalized`]; `suspend()`/`resume()` are otherwise
//! idempotent. The finished signal fires exactly once, on normal completion
//! and on forced removal alike, so dependents blocked on this task are never
//! left hanging.

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;

use crate::error::{RuntimeError, TaskError};
use crate::signal::{Handler, Signal};
use crate::tasks::routine::{Routine, RoutineFn, Step, StepCtx};

/// Slack for virtual-time due comparisons, absorbs f64 accumulation error
/// (`0.1 + 0.1 > 0.2`) so a delay chain stays aligned to driver instants.
const TIME_EPS: f64 = 1e-9;

/// Lifecycle state of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Eligible to resume when its resumption point comes due.
    Active,
    /// Alive but skipped until resumed.
    Suspended,
    /// Terminal; the task is immutable from here on.
    Finalized,
}

/// Where and how the task resumes next.
#[derive(Clone, Copy, Debug)]
enum Pending {
    /// Due once virtual time reaches this instant (seconds since epoch).
    At(f64),
    /// Due exactly once on the first `update()` after the one at `since`.
    NextTick { since: f64 },
    /// Waiting on another task to finalize.
    Blocked,
}

/// Outcome of one `Task::update` as seen by the manager.
pub(crate) enum Poll {
    /// Nothing due, or the task is suspended/finalized.
    Idle,
    /// The routine completed; the task finalized itself.
    Complete,
    /// The routine wants to block on another task.
    Blocked(Task),
}

struct Inner {
    routine: Box<dyn Routine>,
    epoch: f64,
    time: f64,
    dtime: f64,
    count: u64,
    last_resume: f64,
    state: TaskState,
    pending: Pending,
    daemon: bool,
    finished: Signal<Task>,
    finalizer: Option<Box<dyn FnOnce(&StepCtx)>>,
}

/// Clonable handle to a unit of cooperative work.
///
/// Clones share the same underlying task; identity (used by the manager for
/// idempotent registration) is handle identity, not name equality.
#[derive(Clone)]
pub struct Task {
    name: Rc<str>,
    inner: Rc<RefCell<Inner>>,
}

impl Task {
    /// Creates a task from a boxed routine. The task begins Active and is
    /// due immediately once added to a manager.
    pub fn new(name: impl Into<String>, routine: Box<dyn Routine>) -> Self {
        Self::build(name, routine, false)
    }

    /// Creates a daemon task: alive forever, excluded from the manager's
    /// running count so idle-aware rules do not see it as work in flight.
    pub fn daemon(name: impl Into<String>, routine: Box<dyn Routine>) -> Self {
        Self::build(name, routine, true)
    }

    /// Creates a task from a closure, wrapping it in [`RoutineFn`].
    pub fn from_fn<F>(name: impl Into<String>, f: F) -> Self
    where
        F: FnMut(&StepCtx) -> Result<Step, TaskError> + 'static,
    {
        Self::new(name, RoutineFn::boxed(f))
    }

    fn build(name: impl Into<String>, routine: Box<dyn Routine>, daemon: bool) -> Self {
        Self {
            name: Rc::from(name.into()),
            inner: Rc::new(RefCell::new(Inner {
                routine,
                epoch: 0.0,
                time: 0.0,
                dtime: 0.0,
                count: 0,
                last_resume: 0.0,
                state: TaskState::Active,
                pending: Pending::At(0.0),
                daemon,
                finished: Signal::new(),
                finalizer: None,
            })),
        }
    }

    /// Installs a finalizer, invoked exactly once when the task finalizes
    /// (normal completion, fault, or forced removal), with the same clock
    /// view the routine last saw.
    #[must_use]
    pub fn with_finalizer(self, f: impl FnOnce(&StepCtx) + 'static) -> Self {
        self.inner.borrow_mut().finalizer = Some(Box::new(f));
        self
    }

    /// Stable task name, used in logs and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.inner.borrow().state
    }

    /// `true` while the task may be resumed on a tick.
    pub fn is_active(&self) -> bool {
        self.state() == TaskState::Active
    }

    /// `true` once the task reached its terminal state.
    pub fn is_finalized(&self) -> bool {
        self.state() == TaskState::Finalized
    }

    /// `true` until the task finalizes.
    pub fn alive(&self) -> bool {
        !self.is_finalized()
    }

    /// `true` for tasks excluded from the running count.
    pub fn is_daemon(&self) -> bool {
        self.inner.borrow().daemon
    }

    /// Absolute time at which this task's virtual clock starts.
    pub fn epoch(&self) -> f64 {
        self.inner.borrow().epoch
    }

    /// Seconds of virtual time since the epoch, as of the last tick.
    pub fn time(&self) -> f64 {
        self.inner.borrow().time
    }

    /// Seconds of virtual time between the two most recent resumptions.
    pub fn dtime(&self) -> f64 {
        self.inner.borrow().dtime
    }

    /// Number of resumptions so far.
    pub fn count(&self) -> u64 {
        self.inner.borrow().count
    }

    /// Marks the task Suspended. Idempotent; no-op when finalized.
    pub fn suspend(&self) {
        let mut t = self.inner.borrow_mut();
        if t.state == TaskState::Active {
            t.state = TaskState::Suspended;
        }
    }

    /// Marks the task Active again. Idempotent.
    ///
    /// A task resumed while blocked becomes due immediately; its next
    /// resumption observes the current wall instant, with `dtime` spanning
    /// the whole blocked interval.
    ///
    /// # Errors
    /// [`RuntimeError::ResumeFinalized`] when the task has finalized: a
    /// caller relying on `resume()` to drive further progress must notice
    /// that no progress will come.
    pub fn resume(&self) -> Result<(), RuntimeError> {
        if self.wake() {
            Ok(())
        } else {
            Err(RuntimeError::ResumeFinalized {
                task: self.name.to_string(),
            })
        }
    }

    /// Registers a handler on the finished signal.
    ///
    /// A handler connected after finalization is invoked immediately — the
    /// signal has already fired its one time.
    pub fn on_finished(&self, callback: Handler<Task>) {
        if self.is_finalized() {
            (callback.borrow_mut())(self);
            return;
        }
        self.inner.borrow_mut().finished.connect(callback);
    }

    /// Registers a one-shot handler on the finished signal.
    ///
    /// Same immediate-invoke semantics as [`on_finished`](Task::on_finished)
    /// for already-finalized tasks.
    pub fn on_finished_once(&self, callback: Handler<Task>) {
        if self.is_finalized() {
            (callback.borrow_mut())(self);
            return;
        }
        self.inner.borrow_mut().finished.connect_once(callback);
    }

    /// Disconnects a handler from the finished signal.
    pub fn disconnect_finished(&self, callback: &Handler<Task>) {
        self.inner.borrow_mut().finished.disconnect(callback);
    }

    /// `true` when both handles refer to the same task.
    pub fn same(&self, other: &Task) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Anchors the virtual clock; called by the manager at admission so the
    /// task's `time` starts at zero whenever it joins.
    pub(crate) fn set_epoch(&self, epoch: f64) {
        self.inner.borrow_mut().epoch = epoch;
    }

    /// Internal resume: `false` when finalized, `true` otherwise.
    pub(crate) fn wake(&self) -> bool {
        let mut t = self.inner.borrow_mut();
        match t.state {
            TaskState::Finalized => false,
            _ => {
                t.state = TaskState::Active;
                if let Pending::Blocked = t.pending {
                    // due on whichever pass comes next, presenting the wall
                    // instant rather than a stale nominal time
                    t.pending = Pending::NextTick {
                        since: f64::NEG_INFINITY,
                    };
                }
                true
            }
        }
    }

    /// Advances the task against the driver instant `now`.
    ///
    /// Resumes the routine once per due resumption point (deterministic
    /// catch-up for `Step::Sleep`, bounded by `catchup_limit` when set), at
    /// most once for `Step::Tick`.
    pub(crate) fn update(&self, now: f64, catchup_limit: Option<usize>) -> Result<Poll, TaskError> {
        {
            let mut t = self.inner.borrow_mut();
            if t.state == TaskState::Finalized {
                return Ok(Poll::Idle);
            }
            t.time = now - t.epoch;
        }

        let mut resumed = 0usize;
        loop {
            if catchup_limit.is_some_and(|cap| resumed >= cap) {
                // leftover catch-up carries over to the next tick
                let mut t = self.inner.borrow_mut();
                t.time = now - t.epoch;
                return Ok(Poll::Idle);
            }

            let cx = {
                let mut t = self.inner.borrow_mut();
                if t.state != TaskState::Active {
                    return Ok(Poll::Idle);
                }
                let wall = now - t.epoch;
                let at = match t.pending {
                    Pending::At(when) if wall + TIME_EPS >= when => when,
                    Pending::NextTick { since } if now > since => wall,
                    _ => {
                        // resumptions presented nominal times; the task's own
                        // clock still tracks the driver instant
                        t.time = wall;
                        return Ok(Poll::Idle);
                    }
                };
                t.count += 1;
                t.dtime = at - t.last_resume;
                t.last_resume = at;
                t.time = at;
                StepCtx {
                    time: at,
                    dtime: t.dtime,
                    count: t.count,
                }
            };
            resumed += 1;

            let step = {
                let inner = &mut *self.inner.borrow_mut();
                inner.routine.step(&cx)
            };

            match step {
                Ok(Step::Sleep(delay)) => {
                    let mut t = self.inner.borrow_mut();
                    if delay <= 0.0 {
                        t.pending = Pending::NextTick { since: now };
                        t.time = now - t.epoch;
                        return Ok(Poll::Idle);
                    }
                    t.pending = Pending::At(cx.time + delay);
                    // loop: catch up on further elapsed multiples
                }
                Ok(Step::Tick) => {
                    let mut t = self.inner.borrow_mut();
                    t.pending = Pending::NextTick { since: now };
                    t.time = now - t.epoch;
                    return Ok(Poll::Idle);
                }
                Ok(Step::Join(dep)) => {
                    let mut t = self.inner.borrow_mut();
                    t.pending = Pending::Blocked;
                    t.time = now - t.epoch;
                    return Ok(Poll::Blocked(dep));
                }
                Ok(Step::Done) => {
                    self.finalize();
                    return Ok(Poll::Complete);
                }
                Err(err) => {
                    self.finalize();
                    return Err(err);
                }
            }
        }
    }

    /// Runs the completion sequence once: finalizer, then Finalized, then
    /// the finished signal. Returns `false` when already finalized.
    ///
    /// The state is forced to Suspended for the finalizer's benefit, so
    /// `is_active()` reads false while it runs.
    pub(crate) fn finalize(&self) -> bool {
        let (finalizer, mut finished, cx) = {
            let mut t = self.inner.borrow_mut();
            if t.state == TaskState::Finalized {
                return false;
            }
            t.state = TaskState::Suspended;
            (
                t.finalizer.take(),
                mem::take(&mut t.finished),
                StepCtx {
                    time: t.time,
                    dtime: t.dtime,
                    count: t.count,
                },
            )
        };

        if let Some(f) = finalizer {
            f(&cx);
        }
        self.inner.borrow_mut().state = TaskState::Finalized;
        finished.emit(self);
        true
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("count", &self.count())
            .finish()
    }
}
