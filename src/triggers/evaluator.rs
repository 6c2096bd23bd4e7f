//! # Evaluator — the perpetual poll loop around one rule.
//!
//! An [`Evaluator`] is a daemon task that re-checks its [`Rule`] at a
//! bounded rate and, when the rule decides to fire, submits the produced
//! work to the dispatcher one priority level below its own.
//!
//! ## Gate
//! Each poll proceeds to the decision only when, in order:
//! 1. no work fired by this rule is still queued or in flight;
//! 2. every required state object is present;
//! 3. a monitored object's version increased since last seen, or the rule
//!    monitors nothing, or `min_recheck` has elapsed since the last full
//!    check (the safety net that guarantees eventual re-evaluation);
//! 4. for idle-only rules, the manager's running count is zero;
//! 5. the rule's precondition holds.
//!
//! On a full check the evaluator absorbs the latest monitored versions and
//! records the check time — a change is only "consumed" once the decision
//! actually ran, so a version bump observed while some other gate fails is
//! still pending on the next poll.
//!
//! Version gating is what keeps this affordable: naive per-tick polling
//! would re-run decision logic dozens of times a second, while a version
//! comparison turns it into edge-triggered evaluation.

use std::collections::HashMap;

use tracing::debug;

use crate::config::Config;
use crate::dispatch::{Dispatch, Job};
use crate::error::TaskError;
use crate::manager::{RunningGauge, TaskManager};
use crate::state::StateStore;
use crate::tasks::{Routine, Step, StepCtx, Task};
use crate::triggers::rule::{RuleCtx, RuleRef};

/// Perpetual poll task wrapping one rule.
///
/// Lives for the lifetime of the owning manager; it never completes on its
/// own and only goes away on manager teardown or forced removal.
pub struct Evaluator {
    rule: RuleRef,
    dispatch: Dispatch,
    state: StateStore,
    gauge: RunningGauge,
    priority: i32,
    recheck_delay: f64,
    min_recheck: f64,
    last_versions: HashMap<&'static str, u64>,
    last_check: Option<f64>,
}

impl Evaluator {
    /// Creates an evaluator with engine-default pacing.
    pub fn new(
        rule: RuleRef,
        dispatch: Dispatch,
        state: StateStore,
        gauge: RunningGauge,
        priority: i32,
    ) -> Self {
        Self::with_defaults(rule, dispatch, state, gauge, priority, &Config::default())
    }

    /// Creates an evaluator inheriting pacing from a [`Config`].
    pub fn with_defaults(
        rule: RuleRef,
        dispatch: Dispatch,
        state: StateStore,
        gauge: RunningGauge,
        priority: i32,
        config: &Config,
    ) -> Self {
        Self {
            rule,
            dispatch,
            state,
            gauge,
            priority,
            recheck_delay: config.recheck_delay,
            min_recheck: config.min_recheck,
            last_versions: HashMap::new(),
            last_check: None,
        }
    }

    /// Overrides the steady-state poll period, in seconds.
    #[must_use]
    pub fn with_recheck_delay(mut self, secs: f64) -> Self {
        self.recheck_delay = secs;
        self
    }

    /// Overrides the safety-net re-decision interval, in seconds.
    #[must_use]
    pub fn with_min_recheck(mut self, secs: f64) -> Self {
        self.min_recheck = secs;
        self
    }

    /// Wraps the evaluator in a daemon task named after its rule and adds it
    /// to the manager.
    pub fn install(self, manager: &mut TaskManager) -> Task {
        let name = format!("watch:{}", self.rule.name());
        manager.add(Task::daemon(name, Box::new(self)))
    }

    fn poll(&mut self, cx: &StepCtx) {
        let rule = self.rule.clone();

        if self.dispatch.is_scheduled(rule.name()) {
            return;
        }
        if !rule.required().iter().all(|n| self.state.contains(n)) {
            return;
        }

        let monitored = rule.monitored();
        let changed = monitored.is_empty()
            || monitored.iter().any(|n| {
                let seen = self.last_versions.get(n).copied().unwrap_or(0);
                self.state.version(n).unwrap_or(0) > seen
            });
        let overdue = self
            .last_check
            .map_or(true, |at| cx.time - at >= self.min_recheck);
        if !(changed || overdue) {
            return;
        }

        if rule.idle_only() && !self.gauge.is_idle() {
            return;
        }

        let rcx = RuleCtx {
            state: &self.state,
            running: self.gauge.get(),
        };
        if !rule.precondition(&rcx) {
            return;
        }

        // full check: consume the observed change and run the decision
        self.last_check = Some(cx.time);
        for name in monitored.iter().copied() {
            if let Some(version) = self.state.version(name) {
                self.last_versions.insert(name, version);
            }
        }

        if let Some(firing) = rule.decide(&rcx) {
            let (name, routine) = firing.into_parts();
            let priority = self.priority - 1;
            debug!(rule = rule.name(), job = name.as_str(), priority, "rule fired");
            self.dispatch
                .submit(priority, Job::for_rule(name, rule.name(), routine));
        }
    }
}

impl Routine for Evaluator {
    fn step(&mut self, cx: &StepCtx) -> Result<Step, TaskError> {
        self.poll(cx);
        Ok(Step::Sleep(self.recheck_delay))
    }
}
