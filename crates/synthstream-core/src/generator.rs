//! Synthetic stream generation.
//!
//! [`StreamGenerator`] takes a [`HistoryAnalysis`] and emits one row per
//! iteration. Each channel's next value is extrapolated from the previous
//! emitted value:
//!
//! ```text
//! next = last + trend + seasonal_adjust + noise
//! ```
//!
//! - `trend`: the historical mean step `diff_mean`, damped toward zero only
//!   when less than a second elapses between rows
//! - `seasonal_adjust`: 8% of the gap between the hour-of-day mean and the
//!   overall mean
//! - `noise`: `Normal(0, 0.05 × std)`, or `Normal(0, 0.01)` for flat channels
//!
//! Values are then clamped by channel name (see [`clamp_for_channel`]).
//!
//! The RNG is seeded per generator, so two generators built from the same
//! analysis and seed with synthetic time produce identical rows.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDateTime, TimeDelta, Timelike};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::analysis::{ChannelStats, HistoryAnalysis, HourlyProfile, seconds_between};
use crate::error::{SimError, SimResult};
use crate::sink::{EmittedRow, RowSink};
use crate::stop::StopSignal;

/// Weight applied to the hour-of-day deviation from the mean.
pub const SEASONAL_WEIGHT: f64 = 0.08;
/// Noise standard deviation as a fraction of the channel's std.
pub const NOISE_STD_FRACTION: f64 = 0.05;
/// Noise standard deviation for channels with zero dispersion.
pub const NOISE_FLOOR: f64 = 0.01;

/// Longest uninterrupted sleep between stop-flag checks.
const PAUSE_SLICE: Duration = Duration::from_millis(10);

// ---------------------------------------------------------------------------
// Method
// ---------------------------------------------------------------------------

/// Generation method.
///
/// All three names are accepted on the command line; only
/// [`Method::TrendSeasonal`] has an algorithm. The others are rejected with
/// [`SimError::UnsupportedMethod`] before any row is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    RandomWalk,
    #[default]
    TrendSeasonal,
    BootstrapDiff,
}

impl Method {
    pub const ALL: [Method; 3] = [Self::RandomWalk, Self::TrendSeasonal, Self::BootstrapDiff];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RandomWalk => "random_walk",
            Self::TrendSeasonal => "trend_seasonal",
            Self::BootstrapDiff => "bootstrap_diff",
        }
    }

    pub fn is_implemented(&self) -> bool {
        matches!(self, Self::TrendSeasonal)
    }

    pub fn ensure_supported(&self) -> SimResult<()> {
        if self.is_implemented() {
            Ok(())
        } else {
            Err(SimError::UnsupportedMethod(self.as_str().to_string()))
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| {
                SimError::InvalidConfig(format!(
                    "unknown method '{s}' (expected random_walk, trend_seasonal, or bootstrap_diff)"
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Knobs for one generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Wall-clock pause between rows, in seconds. Must be finite and > 0.
    pub interval_seconds: f64,
    pub seed: u64,
    pub method: Method,
    /// Stamp rows with the current local time instead of advancing by the
    /// historical median interval.
    pub use_real_time: bool,
    /// Stop after this many rows. `None` runs until stopped.
    pub max_rows: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 1.0,
            seed: 42,
            method: Method::TrendSeasonal,
            use_real_time: false,
            max_rows: None,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> SimResult<()> {
        if !(self.interval_seconds.is_finite() && self.interval_seconds > 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "interval must be a positive number of seconds, got {}",
                self.interval_seconds
            )));
        }
        Duration::try_from_secs_f64(self.interval_seconds).map_err(|e| {
            SimError::InvalidConfig(format!("interval {}s: {e}", self.interval_seconds))
        })?;
        self.method.ensure_supported()
    }
}

// ---------------------------------------------------------------------------
// Per-channel value generation
// ---------------------------------------------------------------------------

struct ClampRule {
    pattern: &'static str,
    min: f64,
    max: f64,
}

// Applied in order; a name matching several patterns gets every clamp.
const CLAMP_RULES: &[ClampRule] = &[
    ClampRule {
        pattern: "temperature",
        min: -50.0,
        max: 60.0,
    },
    ClampRule {
        pattern: "humidity",
        min: 0.0,
        max: 100.0,
    },
    ClampRule {
        pattern: "air_quality",
        min: 0.0,
        max: f64::INFINITY,
    },
];

/// Clamp `value` by physical plausibility inferred from the channel name.
///
/// Case-insensitive substring match: `temperature` → `[-50, 60]`,
/// `humidity` → `[0, 100]`, `air_quality` → `[0, ∞)`. Other channels pass
/// through unchanged.
pub fn clamp_for_channel(channel: &str, value: f64) -> f64 {
    let name = channel.to_lowercase();
    CLAMP_RULES
        .iter()
        .filter(|rule| name.contains(rule.pattern))
        .fold(value, |v, rule| v.clamp(rule.min, rule.max))
}

/// Trend contribution for a step of `elapsed_seconds`.
pub fn trend_component(diff_mean: f64, elapsed_seconds: f64) -> f64 {
    if diff_mean == 0.0 || elapsed_seconds <= 0.0 {
        return 0.0;
    }
    let per_second = diff_mean / elapsed_seconds.max(1.0);
    per_second * elapsed_seconds
}

/// Pull toward the hour-of-day mean; zero when the hour was never observed.
pub fn seasonal_adjustment(stats: &ChannelStats, profile: Option<&HourlyProfile>, hour: u32) -> f64 {
    let seasonal_mean = profile.and_then(|p| p.get(hour)).unwrap_or(stats.mean);
    (seasonal_mean - stats.mean) * SEASONAL_WEIGHT
}

/// Standard deviation of the noise term.
pub fn noise_std(stats: &ChannelStats) -> f64 {
    if stats.std > 0.0 {
        stats.std * NOISE_STD_FRACTION
    } else {
        NOISE_FLOOR
    }
}

/// Next value for one channel (`trend_seasonal`), already clamped.
pub fn next_value<R: Rng + ?Sized>(
    channel: &str,
    last_value: f64,
    stats: &ChannelStats,
    profile: Option<&HourlyProfile>,
    elapsed_seconds: f64,
    hour: u32,
    rng: &mut R,
) -> SimResult<f64> {
    let trend = trend_component(stats.diff_mean, elapsed_seconds);
    let seasonal = seasonal_adjustment(stats, profile, hour);
    let sigma = noise_std(stats);
    let noise = Normal::new(0.0, sigma)
        .map_err(|e| {
            SimError::Computation(format!("channel '{channel}': noise std {sigma}: {e}"))
        })?
        .sample(rng);

    let next = last_value + trend + seasonal + noise;
    if !next.is_finite() {
        return Err(SimError::Computation(format!(
            "channel '{channel}': non-finite value (last={last_value}, trend={trend}, seasonal={seasonal}, noise={noise})"
        )));
    }
    Ok(clamp_for_channel(channel, next))
}

// ---------------------------------------------------------------------------
// Stream generator
// ---------------------------------------------------------------------------

/// Result of one loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Emitted,
    /// Stop was requested before the iteration started; nothing was written.
    Stopped,
}

/// Why [`StreamGenerator::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    RowLimit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::RowLimit => write!(f, "row limit reached"),
        }
    }
}

/// Summary returned by a finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub rows_emitted: u64,
    pub last_timestamp: NaiveDateTime,
    pub stop_reason: StopReason,
}

/// Where generation left off.
#[derive(Debug, Clone)]
struct RollingState {
    last_timestamp: NaiveDateTime,
    /// Aligned with `StreamGenerator::channels`.
    last_values: Vec<f64>,
}

/// Produces synthetic rows from a history analysis.
pub struct StreamGenerator {
    analysis: HistoryAnalysis,
    config: GeneratorConfig,
    channels: Arc<[String]>,
    cadence_seconds: f64,
    rng: StdRng,
    state: RollingState,
    rows_emitted: u64,
}

impl StreamGenerator {
    /// Validate `config` and seed the rolling state from the history.
    pub fn new(analysis: HistoryAnalysis, config: GeneratorConfig) -> SimResult<Self> {
        config.validate()?;

        let channels: Arc<[String]> = analysis.metadata.channels.clone().into();
        let last_values = channels
            .iter()
            .map(|c| {
                analysis
                    .channel_stats(c)
                    .map(|s| s.last_value)
                    .ok_or_else(|| SimError::Computation(format!("no statistics for channel '{c}'")))
            })
            .collect::<SimResult<Vec<f64>>>()?;

        // A zero median (one row, or mostly repeated timestamps) would stamp
        // every row identically.
        let median = analysis.metadata.median_interval_seconds;
        let cadence_seconds = if median > 0.0 {
            median
        } else {
            if !config.use_real_time {
                warn!(
                    "History median interval is {median}s; advancing synthetic timestamps by the emission interval ({}s) instead",
                    config.interval_seconds
                );
            }
            config.interval_seconds
        };

        let state = RollingState {
            last_timestamp: analysis.metadata.last_timestamp,
            last_values,
        };

        Ok(Self {
            rng: StdRng::seed_from_u64(config.seed),
            analysis,
            config,
            channels,
            cadence_seconds,
            state,
            rows_emitted: 0,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Seconds between consecutive synthetic timestamps.
    pub fn cadence_seconds(&self) -> f64 {
        self.cadence_seconds
    }

    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }

    pub fn last_timestamp(&self) -> NaiveDateTime {
        self.state.last_timestamp
    }

    /// Last emitted (or historical) value per channel.
    pub fn last_values(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.channels
            .iter()
            .map(String::as_str)
            .zip(self.state.last_values.iter().copied())
    }

    /// Produce the next row and advance the rolling state, without a sink.
    pub fn next_row(&mut self) -> SimResult<EmittedRow> {
        let (timestamp, values) = self.compute_next()?;
        let row = EmittedRow::new(timestamp, Arc::clone(&self.channels), values.clone());
        self.commit(timestamp, values);
        Ok(row)
    }

    /// One loop iteration: check for stop, compute a row, append it, advance.
    ///
    /// The rolling state only moves once the sink accepted the row.
    pub fn step<S: RowSink + ?Sized>(
        &mut self,
        sink: &mut S,
        stop: &StopSignal,
    ) -> SimResult<StepOutcome> {
        if stop.is_stop_requested() {
            return Ok(StepOutcome::Stopped);
        }
        let (timestamp, values) = self.compute_next()?;
        let row = EmittedRow::new(timestamp, Arc::clone(&self.channels), values.clone());
        sink.append(&row)?;
        info!("Emitted: {row}");
        self.commit(timestamp, values);
        Ok(StepOutcome::Emitted)
    }

    /// Run until `stop` is requested or `max_rows` is reached.
    ///
    /// Returns `Ok` on either; any other failure is logged and returned.
    pub fn run<S: RowSink + ?Sized>(
        &mut self,
        sink: &mut S,
        stop: &StopSignal,
    ) -> SimResult<RunSummary> {
        info!(
            "Starting simulation -> {}. Interval: {}s. Method: {}",
            sink.describe(),
            self.config.interval_seconds,
            self.config.method
        );
        // Validated in `new`.
        let pause = Duration::from_secs_f64(self.config.interval_seconds);

        let stop_reason = loop {
            if self.row_limit_reached() {
                break StopReason::RowLimit;
            }
            match self.step(sink, stop) {
                Ok(StepOutcome::Emitted) => {}
                Ok(StepOutcome::Stopped) => break StopReason::Cancelled,
                Err(e) => {
                    error!(
                        "Simulation aborted after {} row(s) (last timestamp {}): {e}",
                        self.rows_emitted, self.state.last_timestamp
                    );
                    return Err(e);
                }
            }
            if self.row_limit_reached() {
                break StopReason::RowLimit;
            }
            pause_unless_stopped(pause, stop);
        };

        match stop_reason {
            StopReason::Cancelled => info!("Simulation stopped by user."),
            StopReason::RowLimit => info!("Simulation finished: {stop_reason}."),
        }

        Ok(RunSummary {
            rows_emitted: self.rows_emitted,
            last_timestamp: self.state.last_timestamp,
            stop_reason,
        })
    }

    fn row_limit_reached(&self) -> bool {
        self.config
            .max_rows
            .is_some_and(|limit| self.rows_emitted >= limit)
    }

    fn next_timestamp(&self) -> SimResult<NaiveDateTime> {
        if self.config.use_real_time {
            return Ok(Local::now().naive_local());
        }
        let step = TimeDelta::microseconds((self.cadence_seconds * 1_000_000.0).round() as i64);
        self.state
            .last_timestamp
            .checked_add_signed(step)
            .ok_or_else(|| {
                SimError::Computation(format!(
                    "timestamp overflow advancing {} by {}s",
                    self.state.last_timestamp, self.cadence_seconds
                ))
            })
    }

    fn compute_next(&mut self) -> SimResult<(NaiveDateTime, Vec<f64>)> {
        let next_ts = self.next_timestamp()?;
        let elapsed = seconds_between(self.state.last_timestamp, next_ts);
        let hour = next_ts.hour();

        let mut values = Vec::with_capacity(self.channels.len());
        for (channel, &last) in self.channels.iter().zip(&self.state.last_values) {
            let stats = self.analysis.channel_stats(channel).ok_or_else(|| {
                SimError::Computation(format!("no statistics for channel '{channel}'"))
            })?;
            let profile = self.analysis.profile(channel);
            values.push(next_value(
                channel,
                last,
                stats,
                profile,
                elapsed,
                hour,
                &mut self.rng,
            )?);
        }
        Ok((next_ts, values))
    }

    fn commit(&mut self, timestamp: NaiveDateTime, values: Vec<f64>) {
        self.state = RollingState {
            last_timestamp: timestamp,
            last_values: values,
        };
        self.rows_emitted += 1;
    }
}

/// Sleep for `pause`, waking early if a stop is requested.
fn pause_unless_stopped(pause: Duration, stop: &StopSignal) {
    let deadline = Instant::now() + pause;
    loop {
        if stop.is_stop_requested() {
            return;
        }
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        std::thread::sleep((deadline - now).min(PAUSE_SLICE));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
