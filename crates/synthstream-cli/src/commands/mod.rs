pub mod analyze;
pub mod run;

use std::io::Write;

use env_logger::Env;
use synthstream_core::{
    HistoricalTable, HistoryAnalysis, Method, SimError, SimResult, StopSignal, analyze,
};

/// Default log filter for the `--quiet` / `--verbose` combination.
pub fn default_log_level(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    }
}

/// Install the global logger. `RUST_LOG` wins over the flags.
pub fn init_logging(quiet: bool, verbose: bool) {
    env_logger::Builder::from_env(Env::default().default_filter_or(default_log_level(quiet, verbose)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}",
                buf.timestamp(),
                record.level(),
                record.args()
            )
        })
        .init();
}

/// Route Ctrl+C / SIGTERM into `stop`. Only one handler may exist per process.
pub fn install_stop_handler(stop: &StopSignal) -> SimResult<()> {
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.request_stop())
        .map_err(|e| SimError::SignalHandler(e.to_string()))
}

/// Parse a method name into the enum.
pub fn parse_method(s: &str) -> SimResult<Method> {
    s.trim().parse()
}

/// Load and analyze a history file, logging what was found.
pub fn load_history(path: &str) -> SimResult<HistoryAnalysis> {
    let table = HistoricalTable::load(path)?;
    let analysis = analyze(&table)?;
    log::info!(
        "Loaded {} rows x {} channels from {path} (last {}, median interval {}s)",
        table.len(),
        table.channels().len(),
        analysis.metadata.last_timestamp,
        analysis.metadata.median_interval_seconds
    );
    Ok(analysis)
}
