//! Fixed timing constants and the clamping applied to `start` arguments.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Nominal longest recheck interval. Not enforced by [`clamp_check_interval`].
pub const MAX_BUDGET_TIME: Duration = Duration::from_secs(170);
pub const MIN_BUDGET_TIME: Duration = Duration::from_secs(2);
/// Lowest accepted accuracy threshold, in metres.
pub const MIN_ACCEPTABLE_ACCURACY: f64 = 5.0;
/// How long the source gets to improve a fix before it is checked again.
pub const SETTLE_WINDOW: Duration = Duration::from_secs(3);
/// Delay between restarting the source and settling the budget.
pub const BUDGET_RELEASE_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_ACCEPTABLE_ACCURACY: f64 = 100.0;
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_REPORT_INTERVAL_MINUTES: u32 = 2;

/// Clamp a requested recheck interval.
///
/// The upper clamp is computed and then overwritten by the lower clamp, so
/// the result is `max(requested, MIN_BUDGET_TIME)` and intervals above
/// [`MAX_BUDGET_TIME`] are stored unchanged.
pub fn clamp_check_interval(requested: Duration) -> Duration {
    #[allow(unused_assignments)]
    let mut interval = requested.min(MAX_BUDGET_TIME);
    interval = if requested < MIN_BUDGET_TIME {
        MIN_BUDGET_TIME
    } else {
        requested
    };
    interval
}

/// Clamp a requested accuracy threshold. Lower bound only; NaN maps to the floor.
pub fn clamp_acceptable_accuracy(requested: f64) -> f64 {
    requested.max(MIN_ACCEPTABLE_ACCURACY)
}

/// Settings fixed for one start/stop cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub check_interval: Duration,
    pub acceptable_accuracy: f64,
}

impl Configuration {
    pub fn clamped(check_interval: Duration, acceptable_accuracy: f64) -> Self {
        Self {
            check_interval: clamp_check_interval(check_interval),
            acceptable_accuracy: clamp_acceptable_accuracy(acceptable_accuracy),
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
            acceptable_accuracy: DEFAULT_ACCEPTABLE_ACCURACY,
        }
    }
}
