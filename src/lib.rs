//! # cotick
//!
//! **Cotick** is a cooperative, tick-driven task-scheduling engine with a
//! change-driven auto-trigger framework on top.
//!
//! There is no runtime and no thread underneath: an external driver calls
//! [`TaskManager::update`] at whatever cadence it can sustain, and the whole
//! engine — suspension, resumption, inter-task blocking, catch-up time
//! stepping, rule evaluation — is built from that single polling entry
//! point. It stays correct under irregular call intervals and under dynamic
//! addition/removal of tasks while a scheduling pass is in progress.
//!
//! ## Architecture
//! ```text
//!      driver: update(now) at any cadence
//!                    │
//!                    ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │ TaskManager                                               │
//! │  - owned tasks (insertion order = resumption order)       │
//! │  - Spawner buffer (mid-tick admissions and wakes)         │
//! │  - RunningGauge (alive ∧ Active ∧ non-daemon)             │
//! └───┬──────────────────┬──────────────────┬─────────────────┘
//!     ▼                  ▼                  ▼
//!  ┌───────┐         ┌───────┐    ┌────────────────────┐
//!  │ Task  │         │ Task  │    │ Evaluator (daemon) │
//!  │ work  │         │ work  │    │ wraps one Rule     │
//!  └──┬────┘         └───────┘    └──────────┬─────────┘
//!     │ finished: Signal<Task>               │ fires at priority-1
//!     │ (wakes Join-blocked tasks)           ▼
//!     │                            ┌────────────────────┐
//!     └──────────────────────────► │ Dispatch           │
//!        promotion on finish       │ priority lanes,    │
//!                                  │ 1 foreground slot, │
//!                                  │ rule registry      │
//!                                  └────────────────────┘
//! ```
//!
//! ## Features
//! | Area          | Description                                               | Key types / traits                 |
//! |---------------|-----------------------------------------------------------|------------------------------------|
//! | **Tasks**     | Resumable routines with a virtual clock and catch-up.     | [`Task`], [`Routine`], [`Step`]    |
//! | **Scheduling**| Tick-driven manager; blocking, mid-tick admission.        | [`TaskManager`], [`Spawner`]       |
//! | **Signals**   | Ordered notification channel with one-shot handlers.      | [`Signal`], [`Handler`]            |
//! | **Triggers**  | Version-gated, idle-aware automation rules.               | [`Rule`], [`Evaluator`]            |
//! | **Dispatch**  | Priority lanes with a single foreground slot.             | [`Dispatch`], [`Job`]              |
//! | **State**     | Named state objects with change versions.                 | [`StateStore`]                     |
//! | **Errors**    | Typed engine and routine errors.                          | [`RuntimeError`], [`TaskError`]    |
//!
//! ## Quick start
//! ```rust
//! use cotick::{Config, Step, StepCtx, TaskError, TaskManager};
//!
//! let mut mgr = TaskManager::new(Config::default());
//!
//! // A task that waits half a second of virtual time, then completes.
//! let task = mgr.spawn_fn("hello", |cx: &StepCtx| {
//!     if cx.count == 1 {
//!         return Ok::<_, TaskError>(Step::Sleep(0.5));
//!     }
//!     Ok(Step::Done)
//! });
//!
//! mgr.update(0.0)?;  // first resumption, sleeps
//! mgr.update(0.2)?;  // not due yet
//! mgr.update(0.5)?;  // second resumption, completes
//! assert!(task.is_finalized());
//! # Ok::<(), cotick::RuntimeError>(())
//! ```
//!
//! ## Scheduling model
//! Single-threaded and cooperative. All suspension points are explicit
//! [`Step`] directives returned from a routine's own step; between
//! directives a step runs to completion uninterrupted. `add`/`remove` are
//! safe before the first `update()` or from within a task's own step —
//! never from another thread.

mod config;
mod dispatch;
mod error;
mod manager;
mod signal;
mod state;
mod tasks;
mod triggers;

// ---- Public re-exports ----

pub use config::Config;
pub use dispatch::{Dispatch, Job};
pub use error::{RuntimeError, TaskError};
pub use manager::{RunningGauge, Spawner, TaskManager};
pub use signal::{handler, Handler, Signal};
pub use state::StateStore;
pub use tasks::{Routine, RoutineFn, Step, StepCtx, Task, TaskState};
pub use triggers::{Evaluator, Firing, Rule, RuleCtx, RuleRef};
