//! CLI for synthstream: turn a historical sensor CSV into a live synthetic feed.

mod commands;

use clap::{Parser, Subcommand};
use synthstream_core::StopSignal;

#[derive(Parser)]
#[command(name = "synthstream")]
#[command(about = "synthstream: turn a historical sensor CSV into a live synthetic feed")]
#[command(version = synthstream_core::VERSION)]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, short, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log debug detail (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate synthetic rows from a history and append them to a CSV file.
    /// Runs until Ctrl+C unless --max-rows is given.
    Run {
        /// Historical CSV with a `timestamp` column plus numeric channels
        #[arg(long, default_value = "historical.csv")]
        history: String,

        /// Output CSV (appended to; header written only when created)
        #[arg(long, default_value = "simulated_stream.csv")]
        out: String,

        /// Seconds to wait between rows
        #[arg(long, default_value = "1.0")]
        interval: f64,

        /// RNG seed; same seed and history give the same synthetic-time output
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Generation method (only trend_seasonal is implemented)
        #[arg(long, default_value = "trend_seasonal", value_parser = ["random_walk", "trend_seasonal", "bootstrap_diff"])]
        method: String,

        /// Stamp rows with the current local time instead of synthetic time
        #[arg(long)]
        real_time: bool,

        /// Stop after this many rows
        #[arg(long)]
        max_rows: Option<u64>,
    },

    /// Analyze a history file: per-channel stats, hourly coverage, cadence.
    Analyze {
        /// Historical CSV to analyze
        #[arg(long, default_value = "historical.csv")]
        history: String,

        /// Write the full analysis as JSON
        #[arg(long)]
        output: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    commands::init_logging(cli.quiet, cli.verbose);

    let result = match cli.command {
        Commands::Run {
            history,
            out,
            interval,
            seed,
            method,
            real_time,
            max_rows,
        } => {
            let stop = StopSignal::new();
            commands::install_stop_handler(&stop).and_then(|()| {
                commands::run::run(
                    commands::run::RunCommandConfig {
                        history_path: &history,
                        output_path: &out,
                        interval,
                        seed,
                        method: &method,
                        real_time,
                        max_rows,
                    },
                    &stop,
                )
            })
        }
        Commands::Analyze { history, output } => {
            commands::analyze::run(&history, output.as_deref())
        }
    };

    if let Err(e) = result {
        log::error!("{e}");
        std::process::exit(1);
    }
}
