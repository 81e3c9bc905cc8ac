use clap::{Parser, Subcommand};
use geotick_core::Config;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "geotick", version, about = "Background position polling controller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file against the controller
    Simulate(commands::simulate::SimulateArgs),
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Show the settings the controller would store for a start request
    Clamp(commands::clamp::ClampArgs),
}

/// Install the stderr subscriber. GEOTICK_LOG wins over the config file.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_env("GEOTICK_LOG")
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let config = Config::load_or_default();
    init_logging(&config);

    let result = match cli.command {
        Commands::Simulate(args) => commands::simulate::run(args, &config),
        Commands::Config { action } => commands::config::run(action),
        Commands::Clamp(args) => commands::clamp::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
