//! Deterministic simulation host for the scheduling controller.
//!
//! This module replays a scripted [`Scenario`] against a real
//! [`SchedulingController`] over virtual time. It enables:
//! - Reproducing background sampling sessions without hardware or an OS
//! - Checking budget bookkeeping (every grant released, never two at once)
//! - Inspecting what the consumer would have received, and when
//!
//! All collaborators are implemented by [`SimHost`] over one shared world.
//! Timers fire in due-time order; at equal times scripted steps run first,
//! then timers in the order they were scheduled, then grant expiries.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::controller::{ControllerState, SchedulingController};
use crate::error::{CoreError, LocationError, Result, ScenarioError};
use crate::events::Event;
use crate::host::{
    ApplicationState, BudgetHandle, ClockTime, ExecutionBudget, Host, LifecycleNotifier,
    LocationConsumer, PermissionFlow, PositionSource, TimerId, TimerKind, TimerScheduler,
    WallClock,
};
use crate::location::{AuthorizationStatus, Fix, SourceSettings};
use crate::storage::ControllerConfig;

/// A fix as written in a scenario; the simulator stamps the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptedFix {
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScenarioAction {
    /// Deliver a fix batch. Delivered even while the source is off.
    Fixes { fixes: Vec<ScriptedFix> },
    Error { error: LocationError },
    Authorization { status: AuthorizationStatus },
    EnterBackground,
    BecomeActive,
    /// Revoke the live grant early. No-op without one.
    BudgetExpired,
    RequestAuthorization,
    Start {
        #[serde(default)]
        check_interval_secs: Option<f64>,
        #[serde(default)]
        acceptable_accuracy: Option<f64>,
    },
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioStep {
    /// Seconds since the simulation began.
    pub at_secs: f64,
    #[serde(flatten)]
    pub action: ScenarioAction,
}

/// Scripted session replayed by [`Simulator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    /// Local wall-clock time at t = 0.
    #[serde(default = "default_start_clock")]
    pub start_clock: ClockTime,
    /// UTC instant at t = 0, used for fix timestamps.
    #[serde(default = "default_started_at")]
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub application_state: ApplicationState,
    /// Start the controller at t = 0.
    #[serde(default = "default_true")]
    pub autostart: bool,
    #[serde(default)]
    pub check_interval_secs: Option<f64>,
    #[serde(default)]
    pub acceptable_accuracy: Option<f64>,
    #[serde(default)]
    pub report_interval_minutes: Option<u32>,
    /// Host revokes each grant this long after it was acquired.
    #[serde(default)]
    pub budget_lifetime_secs: Option<f64>,
    #[serde(default)]
    pub steps: Vec<ScenarioStep>,
}

fn default_start_clock() -> ClockTime {
    ClockTime::new(12, 0)
}
fn default_started_at() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).single().unwrap_or_default()
}
fn default_true() -> bool {
    true
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            name: String::new(),
            start_clock: default_start_clock(),
            started_at: default_started_at(),
            application_state: ApplicationState::default(),
            autostart: true,
            check_interval_secs: None,
            acceptable_accuracy: None,
            report_interval_minutes: None,
            budget_lifetime_secs: None,
            steps: Vec::new(),
        }
    }
}

impl Scenario {
    /// Load a scenario from a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, has another extension,
    /// cannot be parsed, or fails [`Scenario::validate`].
    pub fn from_path(path: &Path) -> std::result::Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_failed = |message: String| ScenarioError::Parse {
            path: path.to_path_buf(),
            message,
        };
        let scenario: Scenario = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| parse_failed(e.to_string()))?,
            Some("json") => {
                serde_json::from_str(&content).map_err(|e| parse_failed(e.to_string()))?
            }
            _ => return Err(ScenarioError::UnsupportedFormat(path.to_path_buf())),
        };
        scenario.validate()?;
        Ok(scenario)
    }

    /// # Errors
    ///
    /// Returns [`ScenarioError::Invalid`] for negative, non-finite or
    /// over-long times, an impossible start clock, or a non-positive grant
    /// lifetime.
    pub fn validate(&self) -> std::result::Result<(), ScenarioError> {
        if self.start_clock.hour > 23 || self.start_clock.minute > 59 {
            return Err(ScenarioError::Invalid(format!(
                "start_clock {:02}:{:02} is not a time of day",
                self.start_clock.hour, self.start_clock.minute
            )));
        }
        if let Some(lifetime) = self.budget_lifetime_secs {
            if !(lifetime.is_finite() && lifetime > 0.0) {
                return Err(ScenarioError::Invalid(
                    "budget_lifetime_secs must be positive".into(),
                ));
            }
            seconds(lifetime).map_err(|message| {
                ScenarioError::Invalid(format!("budget_lifetime_secs {message}"))
            })?;
        }
        for (index, step) in self.steps.iter().enumerate() {
            seconds(step.at_secs).map_err(|message| {
                ScenarioError::Invalid(format!("step {index}: at_secs {message}"))
            })?;
            if let ScenarioAction::Start {
                check_interval_secs: Some(secs),
                ..
            } = step.action
            {
                seconds(secs).map_err(|message| {
                    ScenarioError::Invalid(format!("step {index}: check_interval_secs {message}"))
                })?;
            }
        }
        if let Some(secs) = self.check_interval_secs {
            seconds(secs)
                .map_err(|message| ScenarioError::Invalid(format!("check_interval_secs {message}")))?;
        }
        Ok(())
    }
}

/// Longest time a scenario may script: one year.
pub const MAX_SCENARIO_SECS: f64 = 365.0 * 24.0 * 3600.0;

fn seconds(secs: f64) -> std::result::Result<Duration, String> {
    if secs > MAX_SCENARIO_SECS {
        return Err(format!("{secs} exceeds {MAX_SCENARIO_SECS} seconds"));
    }
    Duration::try_from_secs_f64(secs).map_err(|_| format!("{secs} is not a non-negative duration"))
}

/// Something the consumer received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    LocationsUpdated { at_secs: f64, fixes: Vec<Fix> },
    Error { at_secs: f64, error: LocationError },
    AuthorizationChanged { at_secs: f64, status: AuthorizationStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BudgetLedger {
    pub acquired: u32,
    pub released: u32,
    /// Acquire calls the host turned down (foreground).
    pub refused: u32,
    /// Expiry notices delivered to the controller.
    pub expirations: u32,
    /// Releases of handles that were not outstanding.
    pub unknown_releases: u32,
    pub outstanding: usize,
    pub max_outstanding: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLog {
    pub starts: u32,
    pub stops: u32,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub at_secs: f64,
    pub from: ControllerState,
    pub to: ControllerState,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PendingTimer {
    pub kind: TimerKind,
    pub due_secs: f64,
}

/// Outcome of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub scenario: String,
    pub ended_at_secs: f64,
    pub final_state: ControllerState,
    pub check_interval_secs: f64,
    pub acceptable_accuracy: f64,
    pub transitions: Vec<Transition>,
    pub notifications: Vec<Notification>,
    pub budget: BudgetLedger,
    pub source: SourceLog,
    pub subscribed: bool,
    pub pending_timers: Vec<PendingTimer>,
    pub authorization_requests: u32,
}

impl SimulationReport {
    /// Fix batches the consumer received, with their delivery times.
    pub fn reports(&self) -> Vec<(f64, &[Fix])> {
        self.notifications
            .iter()
            .filter_map(|n| match n {
                Notification::LocationsUpdated { at_secs, fixes } => {
                    Some((*at_secs, fixes.as_slice()))
                }
                _ => None,
            })
            .collect()
    }

    /// # Errors
    ///
    /// Returns an error if the report cannot be serialized.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Default)]
struct World {
    now: Duration,
    start_clock: ClockTime,
    app_state: ApplicationState,
    subscribed: bool,
    settings: Option<SourceSettings>,
    source: SourceLog,
    next_timer: u64,
    timers: BTreeMap<(Duration, TimerId), TimerKind>,
    timer_due: BTreeMap<TimerId, Duration>,
    budget_lifetime: Option<Duration>,
    next_grant: u64,
    /// Outstanding grants and when the host will revoke them.
    grants: BTreeMap<BudgetHandle, Option<Duration>>,
    ledger: BudgetLedger,
    authorization_requests: u32,
    notifications: Vec<Notification>,
}

impl World {
    fn now_secs(&self) -> f64 {
        self.now.as_secs_f64()
    }

    fn next_expiry(&self) -> Option<(Duration, BudgetHandle)> {
        self.grants
            .iter()
            .filter_map(|(handle, due)| due.map(|due| (due, *handle)))
            .min()
    }
}

/// Every collaborator of the controller, backed by one shared world.
#[derive(Debug, Clone, Default)]
pub struct SimHost(Rc<RefCell<World>>);

impl SimHost {
    fn host(&self) -> Host {
        Host {
            source: Box::new(self.clone()),
            budget: Box::new(self.clone()),
            lifecycle: Box::new(self.clone()),
            timers: Box::new(self.clone()),
            clock: Box::new(self.clone()),
            permissions: Box::new(self.clone()),
        }
    }

    /// Settings the controller configured the source with.
    pub fn source_settings(&self) -> Option<SourceSettings> {
        self.0.borrow().settings.clone()
    }
}

impl PositionSource for SimHost {
    fn configure(&mut self, settings: &SourceSettings) {
        self.0.borrow_mut().settings = Some(settings.clone());
    }

    fn start(&mut self) {
        let mut world = self.0.borrow_mut();
        world.source.starts += 1;
        world.source.active = true;
    }

    fn stop(&mut self) {
        let mut world = self.0.borrow_mut();
        world.source.stops += 1;
        world.source.active = false;
    }
}

impl ExecutionBudget for SimHost {
    fn acquire(&mut self) -> Option<BudgetHandle> {
        let mut world = self.0.borrow_mut();
        if !world.app_state.needs_budget() {
            world.ledger.refused += 1;
            return None;
        }
        world.next_grant += 1;
        let handle = BudgetHandle(world.next_grant);
        let due = world.budget_lifetime.map(|lifetime| world.now.saturating_add(lifetime));
        world.grants.insert(handle, due);
        world.ledger.acquired += 1;
        world.ledger.outstanding = world.grants.len();
        world.ledger.max_outstanding = world.ledger.max_outstanding.max(world.grants.len());
        Some(handle)
    }

    fn release(&mut self, handle: BudgetHandle) {
        let mut world = self.0.borrow_mut();
        if world.grants.remove(&handle).is_some() {
            world.ledger.released += 1;
        } else {
            world.ledger.unknown_releases += 1;
        }
        world.ledger.outstanding = world.grants.len();
    }
}

impl LifecycleNotifier for SimHost {
    fn subscribe(&mut self) {
        self.0.borrow_mut().subscribed = true;
    }

    fn unsubscribe(&mut self) {
        self.0.borrow_mut().subscribed = false;
    }

    fn application_state(&self) -> ApplicationState {
        self.0.borrow().app_state
    }
}

impl TimerScheduler for SimHost {
    fn schedule(&mut self, kind: TimerKind, after: Duration) -> TimerId {
        let mut world = self.0.borrow_mut();
        world.next_timer += 1;
        let id = TimerId(world.next_timer);
        // Config defaults are not bounded like scenario times.
        let due = world.now.saturating_add(after);
        world.timers.insert((due, id), kind);
        world.timer_due.insert(id, due);
        id
    }

    fn cancel(&mut self, id: TimerId) {
        let mut world = self.0.borrow_mut();
        if let Some(due) = world.timer_due.remove(&id) {
            world.timers.remove(&(due, id));
        }
    }
}

impl WallClock for SimHost {
    fn now(&self) -> ClockTime {
        let world = self.0.borrow();
        world.start_clock.advanced_by(world.now)
    }
}

impl PermissionFlow for SimHost {
    fn request_always_authorization(&mut self) {
        self.0.borrow_mut().authorization_requests += 1;
    }
}

impl LocationConsumer for SimHost {
    fn on_error(&mut self, error: LocationError) {
        let mut world = self.0.borrow_mut();
        let at_secs = world.now_secs();
        world.notifications.push(Notification::Error { at_secs, error });
    }

    fn on_locations_updated(&mut self, fixes: &[Fix]) {
        let mut world = self.0.borrow_mut();
        let at_secs = world.now_secs();
        world.notifications.push(Notification::LocationsUpdated {
            at_secs,
            fixes: fixes.to_vec(),
        });
    }

    fn on_authorization_changed(&mut self, status: AuthorizationStatus) {
        let mut world = self.0.borrow_mut();
        let at_secs = world.now_secs();
        world
            .notifications
            .push(Notification::AuthorizationChanged { at_secs, status });
    }
}

enum Occurrence {
    Step(ScenarioAction),
    Timer(TimerId),
    GrantExpiry(BudgetHandle),
}

/// Replays a [`Scenario`] against a controller over virtual time.
pub struct Simulator {
    name: String,
    host: SimHost,
    controller: SchedulingController,
    steps: VecDeque<(Duration, ScenarioAction)>,
    started_at: DateTime<Utc>,
    check_interval: Duration,
    acceptable_accuracy: f64,
    transitions: Vec<Transition>,
    last_state: ControllerState,
}

impl Simulator {
    /// Build a simulator. Scenario settings override `defaults`.
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario or the defaults are invalid.
    pub fn new(scenario: Scenario, defaults: &ControllerConfig) -> Result<Self> {
        scenario.validate()?;

        let check_interval = match scenario.check_interval_secs {
            Some(secs) => seconds(secs).map_err(ScenarioError::Invalid)?,
            None => defaults.check_interval()?,
        };
        let acceptable_accuracy = scenario
            .acceptable_accuracy
            .unwrap_or(defaults.acceptable_accuracy);
        let report_interval = scenario
            .report_interval_minutes
            .unwrap_or(defaults.report_interval_minutes);

        let host = SimHost::default();
        {
            let mut world = host.0.borrow_mut();
            world.start_clock = scenario.start_clock;
            world.app_state = scenario.application_state;
            world.budget_lifetime = match scenario.budget_lifetime_secs {
                Some(secs) => Some(seconds(secs).map_err(ScenarioError::Invalid)?),
                None => None,
            };
        }

        let mut steps = Vec::with_capacity(scenario.steps.len());
        for step in scenario.steps {
            let at = seconds(step.at_secs).map_err(ScenarioError::Invalid)?;
            steps.push((at, step.action));
        }
        // Stable: steps scripted for the same instant keep their order.
        steps.sort_by_key(|(at, _)| *at);

        let controller = SchedulingController::new(Box::new(host.clone()), host.host(), report_interval);

        let mut sim = Self {
            name: scenario.name,
            host,
            controller,
            steps: steps.into(),
            started_at: scenario.started_at,
            check_interval,
            acceptable_accuracy,
            transitions: Vec::new(),
            last_state: ControllerState::Stopped,
        };

        info!(scenario = %sim.name, steps = sim.steps.len(), "simulation prepared");
        if scenario.autostart {
            sim.controller.start(sim.check_interval, sim.acceptable_accuracy);
            sim.record_transition();
        }
        Ok(sim)
    }

    pub fn controller(&self) -> &SchedulingController {
        &self.controller
    }

    pub fn host(&self) -> &SimHost {
        &self.host
    }

    /// Current virtual time.
    pub fn now(&self) -> Duration {
        self.host.0.borrow().now
    }

    /// Process everything due at or before `until`, then move the clock there.
    pub fn advance_to(&mut self, until: Duration) {
        while let Some((at, occurrence)) = self.take_next(until) {
            self.host.0.borrow_mut().now = at;
            self.dispatch(occurrence);
            self.record_transition();
        }
        let mut world = self.host.0.borrow_mut();
        world.now = world.now.max(until);
    }

    /// Run to `until` and summarize.
    pub fn run(mut self, until: Duration) -> SimulationReport {
        self.advance_to(until);
        self.report()
    }

    pub fn report(&self) -> SimulationReport {
        let world = self.host.0.borrow();
        SimulationReport {
            scenario: self.name.clone(),
            ended_at_secs: world.now_secs(),
            final_state: self.controller.state(),
            check_interval_secs: self.controller.check_interval().as_secs_f64(),
            acceptable_accuracy: self.controller.acceptable_accuracy(),
            transitions: self.transitions.clone(),
            notifications: world.notifications.clone(),
            budget: world.ledger,
            source: world.source,
            subscribed: world.subscribed,
            pending_timers: world
                .timers
                .iter()
                .map(|((due, _), kind)| PendingTimer {
                    kind: *kind,
                    due_secs: due.as_secs_f64(),
                })
                .collect(),
            authorization_requests: world.authorization_requests,
        }
    }

    fn take_next(&mut self, until: Duration) -> Option<(Duration, Occurrence)> {
        let mut world = self.host.0.borrow_mut();

        let step_at = self.steps.front().map(|(at, _)| *at);
        let timer = world.timers.keys().next().copied();
        let expiry = world.next_expiry();

        // Rank breaks ties: steps, then timers, then expiries.
        let candidates = [
            step_at.map(|at| (at, 0)),
            timer.map(|(due, _)| (due, 1)),
            expiry.map(|(due, _)| (due, 2)),
        ];
        let (at, rank) = candidates.into_iter().flatten().min()?;
        if at > until {
            return None;
        }

        let occurrence = match rank {
            0 => self.steps.pop_front().map(|(_, action)| Occurrence::Step(action))?,
            1 => {
                let (due, id) = timer?;
                world.timers.remove(&(due, id));
                world.timer_due.remove(&id);
                Occurrence::Timer(id)
            }
            _ => {
                let (_, handle) = expiry?;
                world.grants.insert(handle, None);
                Occurrence::GrantExpiry(handle)
            }
        };
        Some((at, occurrence))
    }

    fn dispatch(&mut self, occurrence: Occurrence) {
        match occurrence {
            Occurrence::Step(action) => self.apply_step(action),
            Occurrence::Timer(id) => self.controller.handle(Event::TimerFired { id }),
            Occurrence::GrantExpiry(handle) => {
                debug!(handle = handle.0, "host revoking grant");
                self.deliver_expiry();
            }
        }
    }

    fn apply_step(&mut self, action: ScenarioAction) {
        debug!(at_secs = self.now().as_secs_f64(), ?action, "scenario step");
        match action {
            ScenarioAction::Fixes { fixes } => {
                let stamp = chrono::Duration::from_std(self.now())
                    .ok()
                    .and_then(|elapsed| self.started_at.checked_add_signed(elapsed))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                let fixes = fixes
                    .into_iter()
                    .map(|f| Fix::at(f.latitude, f.longitude, f.accuracy, stamp))
                    .collect();
                self.controller.handle(Event::LocationsUpdated { fixes });
            }
            ScenarioAction::Error { error } => {
                self.controller.handle(Event::LocationFailed { error });
            }
            ScenarioAction::Authorization { status } => {
                self.controller.handle(Event::AuthorizationChanged { status });
            }
            ScenarioAction::EnterBackground => {
                if self.set_app_state(ApplicationState::Background) {
                    self.controller.handle(Event::EnteredBackground);
                }
            }
            ScenarioAction::BecomeActive => {
                if self.set_app_state(ApplicationState::Active) {
                    self.controller.handle(Event::BecameActive);
                }
            }
            ScenarioAction::BudgetExpired => {
                let live = self.host.0.borrow().grants.keys().next().copied();
                if let Some(handle) = live {
                    self.host.0.borrow_mut().grants.insert(handle, None);
                    self.deliver_expiry();
                }
            }
            ScenarioAction::RequestAuthorization => self.controller.request_authorization(),
            ScenarioAction::Start {
                check_interval_secs,
                acceptable_accuracy,
            } => {
                let interval = check_interval_secs
                    .and_then(|secs| seconds(secs).ok())
                    .unwrap_or(self.check_interval);
                let accuracy = acceptable_accuracy.unwrap_or(self.acceptable_accuracy);
                self.controller.start(interval, accuracy);
            }
            ScenarioAction::Stop => self.controller.stop(),
        }
    }

    /// Update the application state; true if lifecycle observers are listening.
    fn set_app_state(&mut self, state: ApplicationState) -> bool {
        let mut world = self.host.0.borrow_mut();
        world.app_state = state;
        world.subscribed
    }

    fn deliver_expiry(&mut self) {
        self.host.0.borrow_mut().ledger.expirations += 1;
        self.controller.handle(Event::BudgetExpired);
    }

    fn record_transition(&mut self) {
        let state = self.controller.state();
        if state != self.last_state {
            self.transitions.push(Transition {
                at_secs: self.now().as_secs_f64(),
                from: self.last_state,
                to: state,
            });
            self.last_state = state;
        }
    }
}

/// Load a scenario file and run it to `until`.
///
/// # Errors
///
/// Returns an error if the scenario cannot be loaded or the defaults are invalid.
pub fn run_file(path: &Path, defaults: &ControllerConfig, until: Duration) -> Result<SimulationReport> {
    let scenario = Scenario::from_path(path).map_err(CoreError::from)?;
    Ok(Simulator::new(scenario, defaults)?.run(until))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(at_secs: f64, action: ScenarioAction) -> ScenarioStep {
        ScenarioStep { at_secs, action }
    }

    fn fixes(accuracy: f64) -> ScenarioAction {
        ScenarioAction::Fixes {
            fixes: vec![ScriptedFix {
                latitude: 35.68,
                longitude: 139.76,
                accuracy,
            }],
        }
    }

    #[test]
    fn parses_toml_steps_with_flattened_actions() {
        let scenario: Scenario = toml::from_str(
            r#"
            name = "walk"
            application_state = "background"
            check_interval_secs = 30

            [[steps]]
            at_secs = 0.5
            action = "fixes"
            fixes = [{ latitude = 1.0, longitude = 2.0, accuracy = 40 }]

            [[steps]]
            at_secs = 2
            action = "error"
            error = { kind = "network" }

            [[steps]]
            at_secs = 4
            action = "become_active"
            "#,
        )
        .unwrap();

        assert_eq!(scenario.name, "walk");
        assert_eq!(scenario.application_state, ApplicationState::Background);
        assert_eq!(scenario.start_clock, ClockTime::new(12, 0));
        assert!(scenario.autostart);
        assert_eq!(scenario.steps.len(), 3);
        assert_eq!(scenario.steps[0].action, fixes_at(40.0));
        assert_eq!(
            scenario.steps[1].action,
            ScenarioAction::Error {
                error: LocationError::Network
            }
        );
        assert_eq!(scenario.steps[2].action, ScenarioAction::BecomeActive);
    }

    fn fixes_at(accuracy: f64) -> ScenarioAction {
        ScenarioAction::Fixes {
            fixes: vec![ScriptedFix {
                latitude: 1.0,
                longitude: 2.0,
                accuracy,
            }],
        }
    }

    #[test]
    fn validate_rejects_negative_times() {
        let scenario = Scenario {
            steps: vec![step(-1.0, ScenarioAction::Stop)],
            ..Scenario::default()
        };
        assert!(matches!(scenario.validate(), Err(ScenarioError::Invalid(_))));

        let scenario = Scenario {
            start_clock: ClockTime::new(24, 0),
            ..Scenario::default()
        };
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn validate_rejects_times_beyond_a_year() {
        let scenario = Scenario {
            check_interval_secs: Some(18_446_744_073_709_549_568.0),
            ..Scenario::default()
        };
        assert!(matches!(scenario.validate(), Err(ScenarioError::Invalid(_))));

        let scenario = Scenario {
            steps: vec![step(1e13, fixes(10.0))],
            ..Scenario::default()
        };
        assert!(matches!(scenario.validate(), Err(ScenarioError::Invalid(_))));

        let scenario = Scenario {
            budget_lifetime_secs: Some(1e12),
            ..Scenario::default()
        };
        assert!(matches!(scenario.validate(), Err(ScenarioError::Invalid(_))));

        let scenario = Scenario {
            steps: vec![step(
                5.0,
                ScenarioAction::Start {
                    check_interval_secs: Some(1e15),
                    acceptable_accuracy: None,
                },
            )],
            ..Scenario::default()
        };
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn huge_configured_interval_saturates_the_timer_queue() {
        let defaults = ControllerConfig {
            check_interval_secs: 18_446_744_073_709_549_568.0,
            ..ControllerConfig::default()
        };
        let scenario = Scenario {
            application_state: ApplicationState::Background,
            budget_lifetime_secs: Some(MAX_SCENARIO_SECS),
            steps: vec![step(3000.0, fixes(10.0))],
            ..Scenario::default()
        };
        let report = Simulator::new(scenario, &defaults)
            .unwrap()
            .run(Duration::from_secs(3100));

        assert_eq!(report.final_state, ControllerState::Dormant);
        assert_eq!(report.pending_timers.len(), 1);
        assert_eq!(report.pending_timers[0].kind, TimerKind::Recheck);
        assert_eq!(report.pending_timers[0].due_secs, Duration::MAX.as_secs_f64());
        assert_eq!(report.budget.outstanding, 1);
    }

    #[test]
    fn fix_stamp_clamps_at_the_latest_instant() {
        let scenario = Scenario {
            started_at: DateTime::<Utc>::MAX_UTC,
            steps: vec![step(1.0, fixes(10.0))],
            ..Scenario::default()
        };
        let mut sim = Simulator::new(scenario, &ControllerConfig::default()).unwrap();
        sim.advance_to(Duration::from_secs(2));

        let last = sim.controller().last_fixes();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].timestamp, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn authorization_requests_reach_the_permission_flow() {
        let scenario = Scenario {
            steps: vec![
                step(1.0, ScenarioAction::RequestAuthorization),
                step(2.0, ScenarioAction::Stop),
                step(3.0, ScenarioAction::RequestAuthorization),
            ],
            ..Scenario::default()
        };
        let report = Simulator::new(scenario, &ControllerConfig::default())
            .unwrap()
            .run(Duration::from_secs(5));
        assert_eq!(report.authorization_requests, 2);

        let json: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["authorization_requests"], 2);
    }

    #[test]
    fn timers_fire_in_virtual_time() {
        let scenario = Scenario {
            application_state: ApplicationState::Background,
            check_interval_secs: Some(20.0),
            steps: vec![step(1.0, fixes(10.0))],
            ..Scenario::default()
        };
        let mut sim = Simulator::new(scenario, &ControllerConfig::default()).unwrap();

        sim.advance_to(Duration::from_secs(3));
        assert_eq!(sim.controller().state(), ControllerState::Settling);

        sim.advance_to(Duration::from_secs(4));
        assert_eq!(sim.controller().state(), ControllerState::Dormant);

        let report = sim.report();
        assert_eq!(report.pending_timers.len(), 1);
        assert_eq!(report.pending_timers[0].kind, TimerKind::Recheck);
        assert_eq!(report.pending_timers[0].due_secs, 24.0);
    }

    #[test]
    fn foreground_session_takes_no_grants() {
        let scenario = Scenario {
            steps: vec![step(0.0, fixes(10.0))],
            ..Scenario::default()
        };
        let report = Simulator::new(scenario, &ControllerConfig::default())
            .unwrap()
            .run(Duration::from_secs(5));
        assert_eq!(report.final_state, ControllerState::Dormant);
        assert_eq!(report.budget.acquired, 0);
        assert_eq!(report.budget.refused, 0);
    }

    #[test]
    fn wall_clock_follows_virtual_time() {
        let scenario = Scenario {
            start_clock: ClockTime::new(8, 59),
            autostart: false,
            ..Scenario::default()
        };
        let mut sim = Simulator::new(scenario, &ControllerConfig::default()).unwrap();
        sim.advance_to(Duration::from_secs(61));
        assert_eq!(sim.host().now(), ClockTime::new(9, 0));
        assert_eq!(sim.controller().last_report_clock(), ClockTime::new(8, 59));
    }

    #[test]
    fn source_is_configured_for_background_updates() {
        let sim = Simulator::new(Scenario::default(), &ControllerConfig::default()).unwrap();
        let settings = sim.host().source_settings().unwrap();
        assert!(settings.allows_background_updates);
    }

    #[test]
    fn report_serializes_to_json() {
        let report = Simulator::new(Scenario::default(), &ControllerConfig::default())
            .unwrap()
            .run(Duration::from_secs(1));
        let json: serde_json::Value = serde_json::from_str(&report.to_json_pretty().unwrap()).unwrap();
        assert_eq!(json["final_state"], "sampling");
        assert_eq!(json["transitions"][0]["to"], "sampling");
    }
}
