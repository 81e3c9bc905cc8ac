//! Scheduling controller implementation.
//!
//! The controller is an event-driven state machine. It owns no threads and
//! never blocks: the host delivers [`Event`]s one at a time to
//! [`SchedulingController::handle`], and the controller reacts by starting or
//! stopping the position source, arming or cancelling timers, and acquiring
//! or releasing the execution budget.
//!
//! ## State Transitions
//!
//! ```text
//! Stopped -> Sampling -> Settling -> Dormant -> Sampling -> ...
//!                          ^   |
//!                          +---+  (fix not accurate enough yet)
//! ```
//!
//! `stop()` returns to `Stopped` from anywhere.
//!
//! ## Usage
//!
//! ```ignore
//! let mut controller = SchedulingController::new(consumer, host, 2);
//! controller.start(Duration::from_secs(60), 50.0);
//! // From the host's event loop:
//! controller.handle(Event::LocationsUpdated { fixes });
//! controller.handle(Event::TimerFired { id });
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::settings::{Configuration, BUDGET_RELEASE_DELAY, SETTLE_WINDOW};
use super::throttle::ReportThrottle;
use crate::events::Event;
use crate::host::{BudgetHandle, ClockTime, Host, LocationConsumer, TimerId, TimerKind};
use crate::location::{Fix, SourceSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerState {
    Stopped,
    /// Source running, waiting for the first fix batch.
    Sampling,
    /// Source running, settle timer armed.
    Settling,
    /// Source off, recheck timer armed.
    Dormant,
}

impl ControllerState {
    pub fn as_str(self) -> &'static str {
        match self {
            ControllerState::Stopped => "stopped",
            ControllerState::Sampling => "sampling",
            ControllerState::Settling => "settling",
            ControllerState::Dormant => "dormant",
        }
    }
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Core polling/throttling controller.
pub struct SchedulingController {
    consumer: Box<dyn LocationConsumer>,
    host: Host,
    state: ControllerState,
    config: Configuration,
    throttle: ReportThrottle,
    last_fixes: Vec<Fix>,
    budget: Option<BudgetHandle>,
    /// Whether the source was last told to start.
    source_active: bool,
    settle_timer: Option<TimerId>,
    recheck_timer: Option<TimerId>,
    release_timer: Option<TimerId>,
}

impl SchedulingController {
    /// Create a stopped controller.
    ///
    /// Configures the position source and captures the current wall-clock
    /// time as the throttle reference.
    pub fn new(
        consumer: Box<dyn LocationConsumer>,
        mut host: Host,
        report_interval_minutes: u32,
    ) -> Self {
        host.source.configure(&SourceSettings::default());
        let throttle = ReportThrottle::new(host.clock.now(), report_interval_minutes);
        Self {
            consumer,
            host,
            state: ControllerState::Stopped,
            config: Configuration::default(),
            throttle,
            last_fixes: Vec::new(),
            budget: None,
            source_active: false,
            settle_timer: None,
            recheck_timer: None,
            release_timer: None,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.state != ControllerState::Stopped
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn check_interval(&self) -> Duration {
        self.config.check_interval
    }

    pub fn acceptable_accuracy(&self) -> f64 {
        self.config.acceptable_accuracy
    }

    pub fn report_interval_minutes(&self) -> u32 {
        self.throttle.interval_minutes()
    }

    /// Most recent non-empty fix batch. Survives stop/start.
    pub fn last_fixes(&self) -> &[Fix] {
        &self.last_fixes
    }

    pub fn last_report_clock(&self) -> ClockTime {
        self.throttle.reference()
    }

    pub fn holds_budget(&self) -> bool {
        self.budget.is_some()
    }

    pub fn is_source_active(&self) -> bool {
        self.source_active
    }

    pub fn armed_timer(&self, kind: TimerKind) -> Option<TimerId> {
        match kind {
            TimerKind::Settle => self.settle_timer,
            TimerKind::Recheck => self.recheck_timer,
            TimerKind::BudgetRelease => self.release_timer,
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Begin sampling. Restarts from scratch if already running.
    ///
    /// Out-of-range arguments are clamped, never rejected.
    pub fn start(&mut self, check_interval: Duration, acceptable_accuracy: f64) {
        if self.is_running() {
            self.stop();
        }

        self.config = Configuration::clamped(check_interval, acceptable_accuracy);
        self.state = ControllerState::Sampling;

        self.host.lifecycle.unsubscribe();
        self.host.lifecycle.subscribe();
        self.start_source();

        info!(
            check_interval_secs = self.config.check_interval.as_secs_f64(),
            acceptable_accuracy = self.config.acceptable_accuracy,
            "controller started"
        );
    }

    /// Tear everything down. Safe to call in any state, any number of times.
    pub fn stop(&mut self) {
        let was_running = self.is_running();
        self.state = ControllerState::Stopped;

        for kind in TimerKind::ALL {
            self.disarm(kind);
        }
        self.stop_source();
        self.release_budget();
        self.host.lifecycle.unsubscribe();

        if was_running {
            info!("controller stopped");
        }
    }

    pub fn request_authorization(&mut self) {
        self.host.permissions.request_always_authorization();
    }

    /// Feed one inbound event through the state machine.
    pub fn handle(&mut self, event: Event) {
        debug!(event = event.name(), state = ?self.state, "handling event");
        match event {
            Event::LocationsUpdated { fixes } => self.on_locations(fixes),
            Event::LocationFailed { error } => self.consumer.on_error(error),
            Event::AuthorizationChanged { status } => {
                debug!(allows_background = status.allows_background(), "authorization changed");
                self.consumer.on_authorization_changed(status);
            }
            Event::TimerFired { id } => self.on_timer(id),
            Event::BudgetExpired => self.on_budget_expired(),
            Event::EnteredBackground => {
                if self.is_running() {
                    self.release_budget();
                    self.acquire_budget();
                }
            }
            Event::BecameActive => {
                if self.is_running() {
                    self.release_budget();
                }
            }
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    fn on_locations(&mut self, fixes: Vec<Fix>) {
        if !self.source_active {
            debug!("ignoring fixes while source is stopped");
            return;
        }
        if fixes.is_empty() {
            return;
        }

        self.last_fixes = fixes;

        if self.settle_timer.is_none() {
            self.arm(TimerKind::Settle, SETTLE_WINDOW);
            self.state = ControllerState::Settling;
        }
    }

    fn on_timer(&mut self, id: TimerId) {
        if self.settle_timer == Some(id) {
            self.settle_timer = None;
            self.on_settle_elapsed();
        } else if self.recheck_timer == Some(id) {
            self.recheck_timer = None;
            self.resume_sampling();
        } else if self.release_timer == Some(id) {
            self.release_timer = None;
            self.settle_budget();
        } else {
            debug!(timer = id.0, "ignoring stale timer");
        }
    }

    fn on_settle_elapsed(&mut self) {
        let accuracy = self.last_fixes.last().map(|fix| fix.horizontal_accuracy);
        let acceptable = self
            .last_fixes
            .last()
            .is_some_and(|fix| fix.is_within(self.config.acceptable_accuracy));

        if !acceptable {
            debug!(?accuracy, "fix not accurate enough, waiting again");
            self.arm(TimerKind::Settle, SETTLE_WINDOW);
            return;
        }

        self.acquire_budget();
        self.arm(TimerKind::Recheck, self.config.check_interval);
        self.stop_source();
        self.state = ControllerState::Dormant;

        let now = self.host.clock.now();
        if self.throttle.is_due(now) {
            info!(fixes = self.last_fixes.len(), ?accuracy, "reporting locations");
            self.consumer.on_locations_updated(&self.last_fixes);
        } else {
            debug!(minute = now.minute, "report throttled");
        }
    }

    fn resume_sampling(&mut self) {
        self.disarm(TimerKind::Recheck);
        self.start_source();
        self.state = ControllerState::Sampling;
        self.arm(TimerKind::BudgetRelease, BUDGET_RELEASE_DELAY);
    }

    /// Drop the grant once the source is back up; without a running source
    /// take a fresh grant so background time is not lost.
    fn settle_budget(&mut self) {
        self.release_budget();
        if !self.source_active {
            self.acquire_budget();
        }
    }

    fn on_budget_expired(&mut self) {
        if self.budget.is_none() {
            debug!("ignoring expiry without a live grant");
            return;
        }
        match self.state {
            ControllerState::Dormant => {
                warn!("execution budget expiring, resuming sampling early");
                self.resume_sampling();
            }
            ControllerState::Sampling | ControllerState::Settling => {
                warn!("execution budget expired while sampling");
                self.release_budget();
            }
            ControllerState::Stopped => {}
        }
    }

    // ── Resources ────────────────────────────────────────────────────

    /// Cancel any live timer of `kind`, then schedule a new one.
    fn arm(&mut self, kind: TimerKind, after: Duration) {
        self.disarm(kind);
        let id = self.host.timers.schedule(kind, after);
        *self.timer_slot(kind) = Some(id);
    }

    fn disarm(&mut self, kind: TimerKind) {
        let previous = self.timer_slot(kind).take();
        if let Some(id) = previous {
            self.host.timers.cancel(id);
        }
    }

    fn timer_slot(&mut self, kind: TimerKind) -> &mut Option<TimerId> {
        match kind {
            TimerKind::Settle => &mut self.settle_timer,
            TimerKind::Recheck => &mut self.recheck_timer,
            TimerKind::BudgetRelease => &mut self.release_timer,
        }
    }

    fn start_source(&mut self) {
        self.source_active = true;
        self.host.source.start();
    }

    fn stop_source(&mut self) {
        self.source_active = false;
        self.host.source.stop();
    }

    fn acquire_budget(&mut self) {
        if self.budget.is_some() {
            return;
        }
        let app_state = self.host.lifecycle.application_state();
        if !app_state.needs_budget() {
            return;
        }
        match self.host.budget.acquire() {
            Some(handle) => {
                debug!(handle = handle.0, "execution budget acquired");
                self.budget = Some(handle);
            }
            None => warn!(?app_state, "host refused execution budget"),
        }
    }

    fn release_budget(&mut self) {
        if let Some(handle) = self.budget.take() {
            debug!(handle = handle.0, "execution budget released");
            self.host.budget.release(handle);
        }
    }
}
