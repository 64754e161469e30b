//! # synthstream-core
//!
//! **Turn a sensor history into an endless, plausible stream.**
//!
//! `synthstream-core` reads a historical CSV of timestamped sensor readings,
//! summarizes each channel, and extrapolates new rows one at a time, appending
//! them to a sink until asked to stop.
//!
//! ## Quick Start
//!
//! ```no_run
//! use synthstream_core::{
//!     CsvFileSink, GeneratorConfig, HistoricalTable, StopSignal, StreamGenerator, analyze,
//! };
//!
//! let table = HistoricalTable::load("historical.csv")?;
//! let analysis = analyze(&table)?;
//!
//! let config = GeneratorConfig {
//!     max_rows: Some(10),
//!     ..Default::default()
//! };
//! let mut generator = StreamGenerator::new(analysis, config)?;
//! let mut sink = CsvFileSink::new("simulated_stream.csv");
//! let summary = generator.run(&mut sink, &StopSignal::new())?;
//! println!("{} rows written", summary.rows_emitted);
//! # Ok::<(), synthstream_core::SimError>(())
//! ```
//!
//! ## Architecture
//!
//! History (CSV) → Analysis (stats + hourly profiles) → Generator → Sink
//!
//! - [`history`]: loads and validates the input table
//! - [`analysis`]: per-channel statistics, hour-of-day means, cadence
//! - [`generator`]: the `trend_seasonal` extrapolation loop
//! - [`sink`]: emitted rows and where they go
//!
//! Generation is deterministic for a given seed when synthetic time is used.

pub mod analysis;
pub mod error;
pub mod generator;
pub mod history;
pub mod sink;
pub mod stop;

pub use analysis::{ChannelStats, HistoryAnalysis, HourlyProfile, Metadata, analyze};
pub use error::{SimError, SimResult};
pub use generator::{
    GeneratorConfig, Method, RunSummary, StepOutcome, StopReason, StreamGenerator,
    clamp_for_channel,
};
pub use history::{HistoricalTable, HistoryRow, TIMESTAMP_COLUMN};
pub use sink::{CsvFileSink, EmittedRow, MemorySink, RowSink, format_timestamp};
pub use stop::StopSignal;

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
