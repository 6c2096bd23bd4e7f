//! # Global engine configuration.
//!
//! Provides [`Config`], centralized settings for the scheduling engine.
//!
//! Config is used in two ways:
//! 1. **Manager creation**: `TaskManager::new(config)`
//! 2. **Evaluator defaults**: `Evaluator::with_defaults(.., &config)`
//!
//! ## Sentinel values
//! - `max_catchup = 0` → unbounded catch-up resumptions per task per tick.

/// Global configuration for the scheduling engine.
///
/// ## Field semantics
/// - `max_catchup`: cap on catch-up resumptions of one task within a single
///   `update()` call (`0` = unbounded)
/// - `recheck_delay`: default poll period of a trigger evaluator, seconds
/// - `min_recheck`: default safety-net interval after which an evaluator
///   re-runs its decision even without an observed change, seconds
///
/// ## Notes
/// All fields are public for flexibility. Prefer [`Config::catchup_limit`]
/// over checking the `0` sentinel inline.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Maximum resumptions of one task within a single `update()` call.
    ///
    /// A task sleeping on a short delay is resumed once per elapsed multiple
    /// of that delay when the external driver ticks slower than the delay.
    /// The cap bounds that loop; leftover resumptions carry over to the next
    /// tick. `0` = unbounded (faithful to per-multiple catch-up).
    pub max_catchup: usize,

    /// Default evaluator poll period, in seconds.
    pub recheck_delay: f64,

    /// Default evaluator safety-net re-decision interval, in seconds.
    ///
    /// Guarantees eventual re-evaluation of a rule on a fixed cadence even
    /// when none of its monitored objects change.
    pub min_recheck: f64,
}

impl Config {
    /// Returns the catch-up cap as an `Option` (`None` = unbounded).
    pub fn catchup_limit(&self) -> Option<usize> {
        if self.max_catchup == 0 {
            None
        } else {
            Some(self.max_catchup)
        }
    }
}

impl Default for Config {
    /// Returns a configuration with:
    /// - `max_catchup = 0` (unbounded);
    /// - `recheck_delay = 1.0s`;
    /// - `min_recheck = 30.0s`.
    fn default() -> Self {
        Self {
            max_catchup: 0,
            recheck_delay: 1.0,
            min_recheck: 30.0,
        }
    }
}
