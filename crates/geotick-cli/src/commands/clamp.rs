use std::time::Duration;

use clap::Args;
use geotick_core::Configuration;

#[derive(Args)]
pub struct ClampArgs {
    /// Requested recheck interval in seconds
    #[arg(long)]
    interval: f64,
    /// Requested accuracy threshold in metres
    #[arg(long)]
    accuracy: f64,
    /// Print as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: ClampArgs) -> Result<(), Box<dyn std::error::Error>> {
    let interval = Duration::try_from_secs_f64(args.interval)
        .map_err(|_| format!("--interval must be a non-negative number of seconds, got {}", args.interval))?;

    let clamped = Configuration::clamped(interval, args.accuracy);
    let check_interval_secs = clamped.check_interval.as_secs_f64();

    if args.json {
        let value = serde_json::json!({
            "check_interval_secs": check_interval_secs,
            "acceptable_accuracy": clamped.acceptable_accuracy,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("check_interval_secs = {check_interval_secs}");
        println!("acceptable_accuracy = {}", clamped.acceptable_accuracy);
    }
    Ok(())
}
