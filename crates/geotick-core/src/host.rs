//! Collaborators the controller drives.
//!
//! Every external dependency of [`SchedulingController`] sits behind one of
//! these traits. Implementations are called on the controller's single
//! logical thread and must not call back into the controller synchronously;
//! asynchronous results (fixes, timer expiries, lifecycle transitions, budget
//! expiry) are delivered later as [`Event`]s through
//! [`SchedulingController::handle`].
//!
//! [`SchedulingController`]: crate::SchedulingController
//! [`SchedulingController::handle`]: crate::SchedulingController::handle
//! [`Event`]: crate::Event

use std::time::Duration;

use chrono::Timelike;
use serde::{Deserialize, Serialize};

use crate::error::LocationError;
use crate::location::{AuthorizationStatus, Fix, SourceSettings};

/// Emits fix batches and errors while started.
///
/// Redundant `start`/`stop` calls must be tolerated.
pub trait PositionSource {
    /// Called once when the controller is constructed.
    fn configure(&mut self, _settings: &SourceSettings) {}

    fn start(&mut self);

    fn stop(&mut self);
}

/// Opaque token for a live execution-budget grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BudgetHandle(pub u64);

/// Host-granted background run time.
pub trait ExecutionBudget {
    /// Request a grant. Returns `None` when the host refuses, which is
    /// expected while the process is in the foreground.
    fn acquire(&mut self) -> Option<BudgetHandle>;

    /// End a grant. Called exactly once per handle returned by `acquire`.
    fn release(&mut self, handle: BudgetHandle);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    #[default]
    Active,
    Inactive,
    Background,
}

impl ApplicationState {
    /// Background and inactive processes need a budget grant to keep running.
    pub fn needs_budget(self) -> bool {
        matches!(self, ApplicationState::Inactive | ApplicationState::Background)
    }
}

/// Foreground/background transitions.
///
/// While subscribed the host delivers `EnteredBackground` and `BecameActive`
/// events. Both subscription calls must be idempotent.
pub trait LifecycleNotifier {
    fn subscribe(&mut self);

    fn unsubscribe(&mut self);

    fn application_state(&self) -> ApplicationState;
}

/// Identifier of a scheduled one-shot timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Waits for the source to improve a fix's accuracy.
    Settle,
    /// Dormant period with the source off.
    Recheck,
    /// Short delay after restarting the source before the budget is settled.
    BudgetRelease,
}

impl TimerKind {
    pub const ALL: [TimerKind; 3] = [TimerKind::Settle, TimerKind::Recheck, TimerKind::BudgetRelease];
}

/// One-shot timers on the host's event loop.
///
/// Expiry is delivered as `Event::TimerFired` carrying the id returned here.
/// After `cancel` the id must never fire.
pub trait TimerScheduler {
    fn schedule(&mut self, kind: TimerKind, after: Duration) -> TimerId;

    fn cancel(&mut self, id: TimerId);
}

/// Local wall-clock hour and minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Self {
        Self { hour, minute }
    }

    pub fn of<T: Timelike>(time: &T) -> Self {
        Self::new(time.hour(), time.minute())
    }

    /// The clock reading `elapsed` after `self`, wrapping at midnight.
    pub fn advanced_by(self, elapsed: Duration) -> Self {
        let start = u64::from(self.hour) * 60 + u64::from(self.minute);
        let total = (start + elapsed.as_secs() / 60) % (24 * 60);
        Self::new((total / 60) as u32, (total % 60) as u32)
    }
}

pub trait WallClock {
    fn now(&self) -> ClockTime;
}

/// Reads the local time zone's clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> ClockTime {
        ClockTime::of(&chrono::Local::now())
    }
}

/// External permission prompt.
pub trait PermissionFlow {
    fn request_always_authorization(&mut self);
}

/// Receives everything the controller reports.
pub trait LocationConsumer {
    fn on_error(&mut self, error: LocationError);

    fn on_locations_updated(&mut self, fixes: &[Fix]);

    fn on_authorization_changed(&mut self, status: AuthorizationStatus);
}

/// Bundle of collaborators owned by a controller.
pub struct Host {
    pub source: Box<dyn PositionSource>,
    pub budget: Box<dyn ExecutionBudget>,
    pub lifecycle: Box<dyn LifecycleNotifier>,
    pub timers: Box<dyn TimerScheduler>,
    pub clock: Box<dyn WallClock>,
    pub permissions: Box<dyn PermissionFlow>,
}
