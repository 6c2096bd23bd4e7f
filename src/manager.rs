//! # TaskManager — the tick-driven scheduling core.
//!
//! The manager owns an ordered collection of [`Task`]s and advances them on
//! each external [`update`](TaskManager::update) call. There is no runtime
//! underneath: the driver's cadence *is* the scheduler, and it need not be
//! regular — tasks catch up deterministically on whatever virtual time has
//! elapsed.
//!
//! ## One tick
//! ```text
//! update(now)
//!   ├─► on the very first tick: anchor pre-existing tasks' epochs at `now`
//!   ├─► drain spawner buffers: admit spawned tasks, apply retirements
//!   ├─► pass over a snapshot of owned tasks, insertion order
//!   │     ├─ Sleep/Tick due  → resume routine (catch-up as needed)
//!   │     ├─ Join(other)     → suspend, hook other's finished signal
//!   │     └─ Done / Err      → finalize (finished signal fires)
//!   ├─► repeat passes over exactly the tasks admitted or woken mid-pass,
//!   │   until no new admissions or retirements occur
//!   └─► detach completed tasks, refresh the running gauge
//! ```
//!
//! Tasks spawned by a running routine go through a [`Spawner`] handle into a
//! shared pending buffer, never into the collection being iterated; they get
//! at least one resumption before the tick ends. A task woken by a finished
//! signal mid-tick re-enters through the same buffer, which is how a blocked
//! task resumes in the very tick its dependency finalizes. Removal from
//! inside a step goes through the same handle ([`Spawner::retire`]): the
//! manager is exclusively borrowed during `update()`, so a routine cancels
//! another task by deferring the removal to the next settle point of the
//! current tick.
//!
//! ## Faults
//! A routine error finalizes its task (finished signal fires, dependents are
//! woken), housekeeping completes, and the error then terminates the pass as
//! [`RuntimeError::TaskFaulted`]. Swallowing it here would hide broken
//! automation; the driver decides whether to keep ticking.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::{RuntimeError, TaskError};
use crate::signal::handler;
use crate::tasks::{Poll, Routine, Step, StepCtx, Task};

/// Clonable handle for admitting and retiring tasks from anywhere —
/// including from inside a running routine's step.
///
/// Both operations are deferred: tasks sit in shared buffers until the
/// manager's current (or next) `update()` pass picks them up.
#[derive(Clone)]
pub struct Spawner {
    pending: Rc<RefCell<Vec<Task>>>,
    retired: Rc<RefCell<Vec<Task>>>,
}

impl Spawner {
    /// Creates a task from a boxed routine and enqueues it.
    pub fn spawn(&self, name: impl Into<String>, routine: Box<dyn Routine>) -> Task {
        let task = Task::new(name, routine);
        self.enqueue(task.clone());
        task
    }

    /// Creates a task from a closure and enqueues it.
    pub fn spawn_fn<F>(&self, name: impl Into<String>, f: F) -> Task
    where
        F: FnMut(&StepCtx) -> Result<Step, TaskError> + 'static,
    {
        let task = Task::from_fn(name, f);
        self.enqueue(task.clone());
        task
    }

    /// Enqueues an existing task for admission (or mid-tick revisit).
    pub fn enqueue(&self, task: Task) {
        self.pending.borrow_mut().push(task);
    }

    /// Requests removal of a task from the owning manager, with the same
    /// finalize-and-detach semantics as [`TaskManager::remove`].
    ///
    /// Takes effect at the next settle point, within the current tick when
    /// called from inside a routine's step. Retiring a task the manager does
    /// not own is a harmless no-op.
    pub fn retire(&self, task: Task) {
        self.retired.borrow_mut().push(task);
    }

    pub(crate) fn drain(&self) -> Vec<Task> {
        self.pending.borrow_mut().drain(..).collect()
    }

    pub(crate) fn drain_retired(&self) -> Vec<Task> {
        self.retired.borrow_mut().drain(..).collect()
    }
}

/// Clonable read handle on a manager's running count: tasks that are alive,
/// Active and not daemons. Idle-aware trigger rules key off this.
#[derive(Clone, Default)]
pub struct RunningGauge(Rc<Cell<usize>>);

impl RunningGauge {
    /// Current running count.
    pub fn get(&self) -> usize {
        self.0.get()
    }

    /// `true` when no non-daemon task is runnable.
    pub fn is_idle(&self) -> bool {
        self.get() == 0
    }

    fn set(&self, value: usize) {
        self.0.set(value);
    }
}

/// Owns tasks and advances them on each external tick.
pub struct TaskManager {
    tasks: Vec<Task>,
    spawner: Spawner,
    gauge: RunningGauge,
    config: Config,
    now: f64,
    ticked: bool,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl TaskManager {
    /// Creates an empty manager.
    ///
    /// The first `update()` call defines the clock origin: tasks added
    /// before it are anchored at that first driver instant, so the absolute
    /// magnitude of the driver's clock never matters.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            tasks: Vec::new(),
            spawner: Spawner {
                pending: Rc::new(RefCell::new(Vec::new())),
                retired: Rc::new(RefCell::new(Vec::new())),
            },
            gauge: RunningGauge::default(),
            config,
            now: 0.0,
            ticked: false,
        }
    }

    /// Returns a spawner handle feeding this manager.
    pub fn spawner(&self) -> Spawner {
        self.spawner.clone()
    }

    /// Returns a read handle on the running count.
    pub fn gauge(&self) -> RunningGauge {
        self.gauge.clone()
    }

    /// Number of tasks that are alive, Active and not daemons.
    pub fn running(&self) -> usize {
        self.gauge.get()
    }

    /// Number of owned tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// `true` when no task is owned.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The manager's current virtual time (the last `update()` instant).
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Adds a task, anchoring its epoch at the manager's current time so its
    /// virtual clock starts at zero.
    ///
    /// Idempotent: adding a task the manager already owns is a no-op
    /// returning the existing handle, so the same unit of work can never be
    /// scheduled twice by repeated registration.
    pub fn add(&mut self, task: Task) -> Task {
        self.admit(&task);
        self.refresh_running();
        task
    }

    /// Creates a task from a closure and adds it.
    pub fn spawn_fn<F>(&mut self, name: impl Into<String>, f: F) -> Task
    where
        F: FnMut(&StepCtx) -> Result<Step, TaskError> + 'static,
    {
        self.add(Task::from_fn(name, f))
    }

    /// Creates a task from a boxed routine and adds it.
    pub fn spawn(&mut self, name: impl Into<String>, routine: Box<dyn Routine>) -> Task {
        self.add(Task::new(name, routine))
    }

    /// Forces a task out of the manager: runs its finalizer, fires its
    /// finished signal (waking any dependents) and detaches it, independent
    /// of its suspension state.
    ///
    /// Removing a task the manager does not own is a harmless no-op
    /// returning `false`. From inside a routine's step, where the manager is
    /// exclusively borrowed, use [`Spawner::retire`] instead.
    pub fn remove(&mut self, task: &Task) -> bool {
        if !self.owns(task) {
            return false;
        }
        debug!(task = task.name(), "task removed");
        task.finalize();
        self.detach(task);
        self.refresh_running();
        true
    }

    /// Advances every owned task against the driver instant `now`.
    ///
    /// Call this at whatever cadence the host can sustain; irregular
    /// intervals are fine. `now` must be monotonically non-decreasing.
    ///
    /// # Errors
    /// [`RuntimeError::TaskFaulted`] when a routine raised; the faulting
    /// task has been finalized and detached, the rest of the pass is
    /// abandoned, and the next `update()` proceeds normally.
    pub fn update(&mut self, now: f64) -> Result<(), RuntimeError> {
        self.now = now;
        if !self.ticked {
            self.ticked = true;
            // the first driver instant defines the clock origin; a driver
            // supplying absolute time must not trigger a catch-up replay
            for task in &self.tasks {
                task.set_epoch(now);
            }
        }

        // admissions and retirements that happened between ticks
        let early = self.spawner.drain();
        for task in &early {
            self.admit(task);
        }
        self.reap();

        let snapshot = self.tasks.clone();
        let mut done = Vec::new();
        let mut result = self.pass(&snapshot, now, &mut done);

        // tasks admitted, woken or retired during a pass are settled before
        // the tick is considered complete
        while result.is_ok() {
            let batch = self.spawner.drain();
            for task in &batch {
                self.admit(task);
            }
            let reaped = self.reap();
            if batch.is_empty() && !reaped {
                break;
            }
            result = self.pass(&batch, now, &mut done);
        }

        for task in &done {
            self.detach(task);
        }
        self.refresh_running();
        result
    }

    fn pass(&mut self, batch: &[Task], now: f64, done: &mut Vec<Task>) -> Result<(), RuntimeError> {
        for task in batch {
            if !self.owns(task) {
                continue;
            }
            match task.update(now, self.config.catchup_limit()) {
                Ok(Poll::Idle) => {}
                Ok(Poll::Complete) => {
                    trace!(task = task.name(), count = task.count(), "task completed");
                    done.push(task.clone());
                }
                Ok(Poll::Blocked(dep)) => self.block(task, dep),
                Err(err) => {
                    warn!(task = task.name(), error = %err, "task faulted");
                    task.finalize();
                    done.push(task.clone());
                    // housekeeping in update() still runs before this
                    // surfaces to the driver
                    return Err(RuntimeError::TaskFaulted {
                        task: task.name().to_string(),
                        source: err,
                    });
                }
            }
        }
        Ok(())
    }

    /// Suspends `task` until `dep` finalizes; the wake re-enters the task
    /// through the pending buffer so it resumes within the same tick the
    /// dependency finishes. Joining an already-finalized task wakes at once.
    fn block(&mut self, task: &Task, dep: Task) {
        trace!(task = task.name(), on = dep.name(), "task blocked");
        task.suspend();
        let waiter = task.clone();
        let spawner = self.spawner.clone();
        dep.on_finished_once(handler(move |_: &Task| {
            if waiter.wake() {
                spawner.enqueue(waiter.clone());
            }
        }));
    }

    /// Applies deferred removals. Returns `true` when any owned task was
    /// retired; finalization may wake joiners, so the tick loops once more.
    fn reap(&mut self) -> bool {
        let mut any = false;
        for task in self.spawner.drain_retired() {
            if self.owns(&task) {
                debug!(task = task.name(), "task retired");
                task.finalize();
                self.detach(&task);
                any = true;
            }
        }
        any
    }

    fn admit(&mut self, task: &Task) {
        if self.owns(task) {
            return;
        }
        task.set_epoch(self.now);
        self.tasks.push(task.clone());
        debug!(task = task.name(), epoch = self.now, "task admitted");
    }

    fn detach(&mut self, task: &Task) {
        self.tasks.retain(|t| !t.same(task));
    }

    fn owns(&self, task: &Task) -> bool {
        self.tasks.iter().any(|t| t.same(task))
    }

    fn refresh_running(&self) {
        let running = self
            .tasks
            .iter()
            .filter(|t| t.is_active() && !t.is_daemon())
            .count();
        self.gauge.set(running);
    }
}
