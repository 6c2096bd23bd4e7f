//! # Change-driven auto-triggers.
//!
//! This module provides the trigger framework built on the scheduling core:
//! - [`Rule`] - declarative contract an automation rule implements
//! - [`RuleCtx`] - what a rule sees when evaluated
//! - [`Firing`] - work produced by a positive decision
//! - [`Evaluator`] - perpetual daemon task polling one rule

mod evaluator;
mod rule;

pub use evaluator::Evaluator;
pub use rule::{Firing, Rule, RuleCtx, RuleRef};
