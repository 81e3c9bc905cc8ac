use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use geotick_core::simulation::{self, Notification};
use geotick_core::{Config, SimulationReport};
use tracing::debug;

#[derive(Args)]
pub struct SimulateArgs {
    /// Scenario file (.toml or .json)
    file: PathBuf,
    /// Virtual seconds to run for
    #[arg(long, default_value_t = 600.0)]
    until: f64,
    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(args: SimulateArgs, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let until = Duration::try_from_secs_f64(args.until)
        .map_err(|_| format!("--until must be a non-negative number of seconds, got {}", args.until))?;

    debug!(file = %args.file.display(), until_secs = args.until, "running scenario");
    let report = simulation::run_file(&args.file, &config.controller, until)?;

    if args.json {
        println!("{}", report.to_json_pretty()?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &SimulationReport) {
    let name = if report.scenario.is_empty() {
        "(unnamed)"
    } else {
        report.scenario.as_str()
    };
    println!("Scenario: {name}");
    println!("Ran to:   {:.1}s", report.ended_at_secs);
    println!("State:    {}", report.final_state);
    println!(
        "Settings: check every {}s, accept <= {}m",
        report.check_interval_secs, report.acceptable_accuracy
    );

    println!("\nTransitions:");
    for t in &report.transitions {
        println!("  {:>8.1}s  {} -> {}", t.at_secs, t.from, t.to);
    }

    println!("\nNotifications:");
    if report.notifications.is_empty() {
        println!("  (none)");
    }
    for n in &report.notifications {
        match n {
            Notification::LocationsUpdated { at_secs, fixes } => {
                let accuracy = fixes.last().map(|f| f.horizontal_accuracy).unwrap_or_default();
                println!("  {at_secs:>8.1}s  {} fix(es), last +/-{accuracy}m", fixes.len());
            }
            Notification::Error { at_secs, error } => {
                println!("  {at_secs:>8.1}s  error: {error}");
            }
            Notification::AuthorizationChanged { at_secs, status } => {
                println!("  {at_secs:>8.1}s  authorization: {status:?}");
            }
        }
    }

    let b = &report.budget;
    println!(
        "\nBudget:   acquired {}, released {}, refused {}, expired {}, outstanding {}",
        b.acquired, b.released, b.refused, b.expirations, b.outstanding
    );
    println!(
        "Source:   started {}, stopped {}, {}",
        report.source.starts,
        report.source.stops,
        if report.source.active { "running" } else { "off" }
    );
    if !report.pending_timers.is_empty() {
        println!("Pending:");
        for timer in &report.pending_timers {
            println!("  {:?} at {:.1}s", timer.kind, timer.due_secs);
        }
    }
}
