//! # Dispatch — priority lanes with a single foreground slot.
//!
//! One unit of scheduled work runs in the foreground at a time. Submitting
//! into an empty system starts the job immediately; otherwise it waits in a
//! FIFO lane for its priority and is promoted when the foreground task
//! finishes. Promotion always picks the most urgent non-empty lane, so only
//! the highest-priority submission occupies the foreground slot.
//!
//! Priorities are `i32`, **larger = more urgent**. "One level below" a
//! component running at priority `p` is `p - 1`.
//!
//! Two submission paths:
//! - [`submit`](Dispatch::submit) — queued; opportunistic work that must not
//!   pre-empt in-flight work of equal or higher priority.
//! - [`submit_now`](Dispatch::submit_now) — immediate, bypasses the lanes
//!   entirely; for sub-steps a routine needs finished before it can proceed
//!   (typically followed by `Step::Join` on the returned task).
//!
//! The dispatch also keeps the registry of rule names with work in flight,
//! which is how a trigger evaluator avoids scheduling the same rule twice.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::manager::Spawner;
use crate::signal::handler;
use crate::tasks::{Routine, Task};

/// A unit of work awaiting a foreground slot.
pub struct Job {
    name: String,
    routine: Box<dyn Routine>,
    rule: Option<String>,
}

impl Job {
    /// Creates a plain job.
    pub fn new(name: impl Into<String>, routine: Box<dyn Routine>) -> Self {
        Self {
            name: name.into(),
            routine,
            rule: None,
        }
    }

    /// Creates a job tagged with the rule that fired it; the rule counts as
    /// scheduled until this job's task finalizes.
    pub fn for_rule(
        name: impl Into<String>,
        rule: impl Into<String>,
        routine: Box<dyn Routine>,
    ) -> Self {
        Self {
            name: name.into(),
            routine,
            rule: Some(rule.into()),
        }
    }
}

struct Foreground {
    task: Task,
    rule: Option<String>,
}

struct Inner {
    lanes: BTreeMap<i32, VecDeque<Job>>,
    foreground: Option<Foreground>,
    scheduled: HashSet<String>,
    spawner: Spawner,
}

/// Clonable handle to the priority-lane dispatcher.
#[derive(Clone)]
pub struct Dispatch {
    inner: Rc<RefCell<Inner>>,
}

impl Dispatch {
    /// Creates a dispatcher feeding tasks into the given manager's spawner.
    #[must_use]
    pub fn new(spawner: Spawner) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                lanes: BTreeMap::new(),
                foreground: None,
                scheduled: HashSet::new(),
                spawner,
            })),
        }
    }

    /// Enqueues a job at the given priority and pumps the foreground slot.
    pub fn submit(&self, priority: i32, job: Job) {
        {
            let mut inner = self.inner.borrow_mut();
            if let Some(rule) = &job.rule {
                inner.scheduled.insert(rule.clone());
            }
            debug!(job = job.name.as_str(), priority, "job queued");
            inner.lanes.entry(priority).or_default().push_back(job);
        }
        self.pump();
    }

    /// Starts a job immediately, bypassing the lanes. The priority is
    /// bookkeeping only (recorded for logs); nothing is displaced.
    ///
    /// Returns the started task so the caller can `Step::Join` it.
    pub fn submit_now(&self, priority: i32, job: Job) -> Task {
        let rule = job.rule.clone();
        let task = {
            let mut inner = self.inner.borrow_mut();
            if let Some(rule) = &rule {
                inner.scheduled.insert(rule.clone());
            }
            let task = Task::new(job.name, job.routine);
            inner.spawner.enqueue(task.clone());
            task
        };
        debug!(task = task.name(), priority, "job started out of band");

        if let Some(rule) = rule {
            let weak = Rc::downgrade(&self.inner);
            task.on_finished_once(handler(move |_: &Task| {
                if let Some(inner) = weak.upgrade() {
                    inner.borrow_mut().scheduled.remove(&rule);
                }
            }));
        }
        task
    }

    /// `true` while a job fired by this rule is queued or in the foreground.
    pub fn is_scheduled(&self, rule: &str) -> bool {
        self.inner.borrow().scheduled.contains(rule)
    }

    /// `true` while a task occupies the foreground slot.
    pub fn busy(&self) -> bool {
        self.inner.borrow().foreground.is_some()
    }

    /// The task currently holding the foreground slot, if any.
    #[must_use]
    pub fn foreground(&self) -> Option<Task> {
        self.inner.borrow().foreground.as_ref().map(|fg| fg.task.clone())
    }

    /// Number of jobs waiting in lanes (foreground excluded).
    pub fn backlog(&self) -> usize {
        self.inner.borrow().lanes.values().map(VecDeque::len).sum()
    }

    /// Drops every queued job and unregisters their rule tags. The
    /// foreground task is untouched; force it out with
    /// [`TaskManager::remove`](crate::TaskManager::remove) if needed.
    pub fn flush_queued(&self) {
        let mut inner = self.inner.borrow_mut();
        let inner = &mut *inner;
        for queue in inner.lanes.values_mut() {
            for job in queue.drain(..) {
                if let Some(rule) = &job.rule {
                    inner.scheduled.remove(rule);
                }
            }
        }
    }

    /// Promotes the head of the most urgent non-empty lane when the
    /// foreground slot is free.
    fn pump(&self) {
        let started = {
            let mut inner = self.inner.borrow_mut();
            if inner.foreground.is_some() {
                return;
            }
            let priority = inner
                .lanes
                .iter()
                .rev()
                .find(|(_, queue)| !queue.is_empty())
                .map(|(priority, _)| *priority);
            let Some(priority) = priority else {
                return;
            };
            let job = inner
                .lanes
                .get_mut(&priority)
                .and_then(VecDeque::pop_front)
                .expect("lane was non-empty");

            let task = Task::new(job.name, job.routine);
            inner.spawner.enqueue(task.clone());
            inner.foreground = Some(Foreground {
                task: task.clone(),
                rule: job.rule,
            });
            debug!(task = task.name(), priority, "promoted to foreground");
            task
        };

        // hook attached outside the borrow: finalization may re-enter pump()
        let weak = Rc::downgrade(&self.inner);
        started.on_finished_once(handler(move |_: &Task| {
            let Some(rc) = weak.upgrade() else {
                return;
            };
            {
                let mut inner = rc.borrow_mut();
                if let Some(fg) = inner.foreground.take() {
                    if let Some(rule) = fg.rule {
                        inner.scheduled.remove(&rule);
                    }
                }
            }
            Dispatch { inner: rc }.pump();
        }));
    }
}
