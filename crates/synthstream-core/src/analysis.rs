//! History analysis: per-channel descriptors and hour-of-day profiles.
//!
//! [`analyze`] turns a [`HistoricalTable`] into everything the generator
//! needs and nothing else:
//!
//! - [`ChannelStats`]: last value, mean, sample standard deviation, and the
//!   mean/std of the first-difference series
//! - [`HourlyProfile`]: mean value per hour of day (only hours present)
//! - [`Metadata`]: last timestamp, median sampling interval, channel order
//!
//! The analysis is a pure function of its input. The caller's table is never
//! reordered or extended; sorting happens on a local index.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::error::{SimError, SimResult};
use crate::history::HistoricalTable;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Summary statistics for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    /// Last non-missing value in timestamp order.
    pub last_value: f64,
    pub mean: f64,
    /// Sample standard deviation; 0.0 with fewer than two values.
    pub std: f64,
    /// Mean of consecutive differences; 0.0 when there are none.
    pub diff_mean: f64,
    /// Sample standard deviation of consecutive differences.
    pub diff_std: f64,
}

/// Mean channel value per hour of day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyProfile {
    means: BTreeMap<u32, f64>,
}

impl HourlyProfile {
    /// Mean for `hour` (0–23), if that hour occurred in the history.
    pub fn get(&self, hour: u32) -> Option<f64> {
        self.means.get(&hour).copied()
    }

    /// Hours that have an entry, ascending.
    pub fn hours(&self) -> impl Iterator<Item = u32> + '_ {
        self.means.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }
}

impl FromIterator<(u32, f64)> for HourlyProfile {
    fn from_iter<I: IntoIterator<Item = (u32, f64)>>(iter: I) -> Self {
        Self {
            means: iter.into_iter().collect(),
        }
    }
}

/// Stream-level facts about the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub last_timestamp: NaiveDateTime,
    /// Median gap between consecutive sorted timestamps; 0.0 for a single row.
    pub median_interval_seconds: f64,
    /// Channel names in header order.
    pub channels: Vec<String>,
}

/// Full output of [`analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryAnalysis {
    pub stats: BTreeMap<String, ChannelStats>,
    pub profiles: BTreeMap<String, HourlyProfile>,
    pub metadata: Metadata,
}

impl HistoryAnalysis {
    pub fn channel_stats(&self, channel: &str) -> Option<&ChannelStats> {
        self.stats.get(channel)
    }

    pub fn profile(&self, channel: &str) -> Option<&HourlyProfile> {
        self.profiles.get(channel)
    }

    /// Pretty-printed JSON, as written by `synthstream analyze --output`.
    pub fn to_json_pretty(&self) -> SimResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SimError::Computation(format!("serializing analysis: {e}")))
    }

    pub fn from_json(json: &str) -> SimResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| SimError::InvalidHistory(format!("analysis JSON: {e}")))
    }
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

/// Derive statistics, hourly profiles, and metadata from a history table.
///
/// Fails with [`SimError::InvalidHistory`] when the table has no rows, no
/// channels, or a channel without a single numeric value.
pub fn analyze(table: &HistoricalTable) -> SimResult<HistoryAnalysis> {
    if table.is_empty() {
        return Err(SimError::InvalidHistory("history has no data rows".into()));
    }
    if table.channels().is_empty() {
        return Err(SimError::InvalidHistory(
            "history has no channel columns besides the timestamp".into(),
        ));
    }

    let rows = table.rows();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    // Stable: ties keep file order.
    order.sort_by_key(|&i| rows[i].timestamp);

    let timestamps: Vec<NaiveDateTime> = order.iter().map(|&i| rows[i].timestamp).collect();
    let hours: Vec<u32> = timestamps.iter().map(|ts| ts.hour()).collect();

    let mut stats = BTreeMap::new();
    let mut profiles = BTreeMap::new();
    for (col, name) in table.channels().iter().enumerate() {
        let series: Vec<Option<f64>> = order.iter().map(|&i| rows[i].values[col]).collect();
        stats.insert(name.clone(), channel_stats(name, &series)?);
        profiles.insert(name.clone(), hourly_profile(&series, &hours));
    }

    let gaps: Vec<f64> = timestamps
        .windows(2)
        .map(|w| seconds_between(w[0], w[1]))
        .collect();

    let metadata = Metadata {
        // Non-empty checked above.
        last_timestamp: timestamps[timestamps.len() - 1],
        median_interval_seconds: median(&gaps),
        channels: table.channels().to_vec(),
    };

    Ok(HistoryAnalysis {
        stats,
        profiles,
        metadata,
    })
}

/// Statistics for one channel, given its values in timestamp order.
pub fn channel_stats(name: &str, series: &[Option<f64>]) -> SimResult<ChannelStats> {
    let present: Vec<f64> = series.iter().flatten().copied().collect();
    let Some(&last_value) = present.last() else {
        return Err(SimError::InvalidHistory(format!(
            "channel '{name}' has no numeric values"
        )));
    };

    // A difference needs both neighbours present.
    let diffs: Vec<f64> = series
        .windows(2)
        .filter_map(|w| match (w[0], w[1]) {
            (Some(a), Some(b)) => Some(b - a),
            _ => None,
        })
        .collect();

    Ok(ChannelStats {
        last_value,
        mean: mean(&present),
        std: sample_std(&present),
        diff_mean: mean(&diffs),
        diff_std: sample_std(&diffs),
    })
}

/// Mean value per hour of day. `hours[i]` is the hour of `series[i]`.
pub fn hourly_profile(series: &[Option<f64>], hours: &[u32]) -> HourlyProfile {
    let mut buckets: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (value, &hour) in series.iter().zip(hours) {
        if let Some(v) = value {
            buckets.entry(hour).or_default().push(*v);
        }
    }
    buckets
        .into_iter()
        .map(|(hour, values)| (hour, mean(&values)))
        .collect()
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Signed seconds from `from` to `to`, with microsecond resolution.
pub(crate) fn seconds_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_seconds() as f64,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().mean()
    }
}

fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        0.0
    } else {
        values.iter().std_dev()
    }
}

/// Median; averages the two middle values for even lengths. 0.0 when empty.
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
