mod cmd;
mod output;
mod root;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, OverrideArgs};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "shakefetch",
    about = "Fetch full-day seismic waveforms in small, rate-limit-friendly chunks",
    version,
    propagate_version = true
)]
struct Cli {
    /// Config file (default: nearest shakefetch.yaml at or above the current directory)
    #[arg(long = "config", global = true, env = "SHAKEFETCH_CONFIG")]
    config_path: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Acquire every missing day in the configured range
    Run {
        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Show the request windows for one day
    Plan {
        /// Day to plan (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Window width in hours (default: from config)
        #[arg(long)]
        chunk_hours: Option<u32>,
    },

    /// Show which days of the range already have artifacts
    Status {
        #[command(flatten)]
        overrides: OverrideArgs,
    },

    /// Create, show and validate shakefetch.yaml
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let explicit = cli.config_path.as_deref();

    let result = match cli.command {
        Commands::Run { overrides } => cmd::run::run(explicit, &overrides, cli.json),
        Commands::Plan { date, chunk_hours } => cmd::plan::run(explicit, date, chunk_hours, cli.json),
        Commands::Status { overrides } => cmd::status::run(explicit, &overrides, cli.json),
        Commands::Config { subcommand } => cmd::config::run(explicit, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
