//! # geotick Core Library
//!
//! This library provides the scheduling logic for sampling a position source
//! while an application runs in the background under a time-limited execution
//! allowance granted by the host.
//!
//! ## Architecture
//!
//! - **Scheduling Controller**: an event-driven state machine. The host feeds
//!   it [`Event`]s one at a time (fix batches, timer expiries, lifecycle
//!   transitions, budget expiry) and it drives the position source, the timers
//!   and the execution budget through the traits in [`host`]
//! - **Host traits**: the position source, execution budget, lifecycle
//!   notifier, timer scheduler, wall clock, permission flow and consumer
//! - **Simulation**: a deterministic virtual-time host for replaying scripted
//!   scenarios against the controller
//! - **Storage**: TOML-based configuration
//!
//! ## Key Components
//!
//! - [`SchedulingController`]: Core polling/throttling state machine
//! - [`Simulator`]: Scenario replay over virtual time
//! - [`Config`]: Application configuration management

pub mod controller;
pub mod error;
pub mod events;
pub mod host;
pub mod location;
pub mod simulation;
pub mod storage;

pub use controller::{Configuration, ControllerState, ReportThrottle, SchedulingController};
pub use error::{ConfigError, CoreError, LocationError, ScenarioError};
pub use events::Event;
pub use host::{
    ApplicationState, BudgetHandle, ClockTime, ExecutionBudget, Host, LifecycleNotifier,
    LocationConsumer, PermissionFlow, PositionSource, SystemClock, TimerId, TimerKind,
    TimerScheduler, WallClock,
};
pub use location::{AuthorizationStatus, DesiredAccuracy, Fix, SourceSettings};
pub use simulation::{Scenario, SimulationReport, Simulator};
pub use storage::Config;
