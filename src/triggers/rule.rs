//! # Rule — the auto-trigger contract.
//!
//! A [`Rule`] is a stateless, declarative description of when automation
//! work should fire: which state objects it needs, which it watches for
//! change, whether it may only run when the scheduler is idle, a cheap
//! precondition, and the decision function that inspects state and either
//! produces the work to run or declines.
//!
//! Rules own no mutable state; everything per-instance (seen versions,
//! throttles, the "already scheduled" check) lives in the
//! [`Evaluator`](crate::Evaluator) wrapping the rule and in the
//! [`Dispatch`](crate::Dispatch) registry.

use std::rc::Rc;

use crate::state::StateStore;
use crate::tasks::Routine;

/// What a rule sees when evaluated.
pub struct RuleCtx<'a> {
    /// The current state objects.
    pub state: &'a StateStore,
    /// The owning manager's running count (alive, Active, non-daemon tasks).
    pub running: usize,
}

/// Work produced by a positive decision.
///
/// The rule builds the routine from whatever parameters its decision
/// computed; the evaluator only carries it to the dispatcher.
pub struct Firing {
    name: String,
    routine: Box<dyn Routine>,
}

impl Firing {
    /// Bundles the work task's name and routine.
    pub fn new(name: impl Into<String>, routine: Box<dyn Routine>) -> Self {
        Self {
            name: name.into(),
            routine,
        }
    }

    pub(crate) fn into_parts(self) -> (String, Box<dyn Routine>) {
        (self.name, self.routine)
    }
}

/// Declarative trigger contract implemented by every automation rule.
pub trait Rule: 'static {
    /// Stable rule name; keys the scheduled-rule registry.
    fn name(&self) -> &str;

    /// State objects that must exist for the rule to be evaluable at all.
    fn required(&self) -> &[&'static str];

    /// Subset of [`required`](Rule::required) whose version change gates
    /// re-evaluation. Empty means "always consider ready".
    fn monitored(&self) -> &[&'static str] {
        &[]
    }

    /// Evaluate only when the owning manager's running count is zero.
    fn idle_only(&self) -> bool {
        false
    }

    /// Cheap gate checked before [`decide`](Rule::decide). Defaults to pass.
    fn precondition(&self, _cx: &RuleCtx<'_>) -> bool {
        true
    }

    /// Inspects state and decides whether to fire.
    fn decide(&self, cx: &RuleCtx<'_>) -> Option<Firing>;
}

/// Shared rule handle.
pub type RuleRef = Rc<dyn Rule>;
