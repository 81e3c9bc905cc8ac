mod engine;
pub mod settings;
mod throttle;

pub use engine::{ControllerState, SchedulingController};
pub use settings::{clamp_acceptable_accuracy, clamp_check_interval, Configuration};
pub use throttle::ReportThrottle;
