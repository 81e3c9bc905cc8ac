use serde::{Deserialize, Serialize};

use crate::error::LocationError;
use crate::host::TimerId;
use crate::location::{AuthorizationStatus, Fix};

/// Everything that can happen to the controller from the outside.
/// Hosts deliver these one at a time to `SchedulingController::handle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// The position source produced a batch of fixes, oldest first.
    LocationsUpdated { fixes: Vec<Fix> },
    LocationFailed { error: LocationError },
    AuthorizationChanged { status: AuthorizationStatus },
    /// A timer previously returned by `TimerScheduler::schedule` elapsed.
    TimerFired { id: TimerId },
    /// The host is about to revoke the current execution budget.
    BudgetExpired,
    EnteredBackground,
    BecameActive,
}

impl Event {
    /// Short name for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Event::LocationsUpdated { .. } => "locations_updated",
            Event::LocationFailed { .. } => "location_failed",
            Event::AuthorizationChanged { .. } => "authorization_changed",
            Event::TimerFired { .. } => "timer_fired",
            Event::BudgetExpired => "budget_expired",
            Event::EnteredBackground => "entered_background",
            Event::BecameActive => "became_active",
        }
    }
}
