//! Emitted rows and the sinks that receive them.
//!
//! # Output format
//!
//! [`CsvFileSink`] appends one line per row to a CSV file:
//!
//! ```text
//! timestamp,temperature,humidity
//! 2024-06-01T03:00:00,21.48,55.1
//! ```
//!
//! The header is written only when the file does not exist yet, so restarting
//! a simulation against the same output keeps every earlier record.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};

use crate::error::{SimError, SimResult};
use crate::history::TIMESTAMP_COLUMN;

// ---------------------------------------------------------------------------
// Emitted row
// ---------------------------------------------------------------------------

/// One synthetic reading: a timestamp plus one value per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct EmittedRow {
    /// ISO-8601 local timestamp, see [`format_timestamp`].
    pub timestamp: String,
    channels: Arc<[String]>,
    values: Vec<f64>,
}

impl EmittedRow {
    /// `values[i]` belongs to `channels[i]`.
    pub fn new(timestamp: NaiveDateTime, channels: Arc<[String]>, values: Vec<f64>) -> Self {
        debug_assert_eq!(channels.len(), values.len());
        Self {
            timestamp: format_timestamp(timestamp),
            channels,
            values,
        }
    }

    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Value for a channel by name.
    pub fn value(&self, channel: &str) -> Option<f64> {
        self.channels
            .iter()
            .position(|c| c == channel)
            .map(|i| self.values[i])
    }

    /// `(channel, value)` pairs in channel order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.channels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// CSV header line for rows shaped like this one (no newline).
    pub fn csv_header(&self) -> String {
        std::iter::once(TIMESTAMP_COLUMN)
            .chain(self.channels.iter().map(String::as_str))
            .map(escape_field)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// CSV record line for this row (no newline).
    pub fn csv_record(&self) -> String {
        let mut line = escape_field(&self.timestamp);
        for v in &self.values {
            line.push(',');
            line.push_str(&format_value(*v));
        }
        line
    }
}

impl fmt::Display for EmittedRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{timestamp: {}", self.timestamp)?;
        for (name, value) in self.fields() {
            write!(f, ", {name}: {}", format_value(value))?;
        }
        write!(f, "}}")
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Destination for emitted rows.
///
/// `append` must write the whole row or fail; a row is never left half
/// written.
pub trait RowSink {
    fn append(&mut self, row: &EmittedRow) -> SimResult<()>;

    /// Human-readable destination, used in log lines.
    fn describe(&self) -> String {
        "sink".to_string()
    }
}

/// Appends rows to a CSV file, creating it with a header on first use.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    path: PathBuf,
}

impl CsvFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowSink for CsvFileSink {
    fn append(&mut self, row: &EmittedRow) -> SimResult<()> {
        let needs_header = !self.path.exists();

        // Build the full chunk first so it goes out in a single write.
        let mut chunk = String::new();
        if needs_header {
            chunk.push_str(&row.csv_header());
            chunk.push('\n');
        }
        chunk.push_str(&row.csv_record());
        chunk.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SimError::io(&self.path, e))?;
        file.write_all(chunk.as_bytes())
            .and_then(|()| file.flush())
            .map_err(|e| SimError::io(&self.path, e))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Collects rows in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    rows: Vec<EmittedRow>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> &[EmittedRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<EmittedRow> {
        self.rows
    }
}

impl RowSink for MemorySink {
    fn append(&mut self, row: &EmittedRow) -> SimResult<()> {
        self.rows.push(row.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Format a timestamp as ISO-8601 without offset.
///
/// Microseconds are appended only when non-zero:
/// `2024-06-01T03:00:00` or `2024-06-01T03:00:00.250000`.
pub fn format_timestamp(ts: NaiveDateTime) -> String {
    if ts.nanosecond() / 1_000 == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Shortest round-trip float text, always with a decimal point when finite.
fn format_value(v: f64) -> String {
    let s = v.to_string();
    if v.is_finite() && !s.contains('.') {
        format!("{s}.0")
    } else {
        s
    }
}

/// Quote a CSV field if it contains a delimiter, quote, or newline.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::split_csv_line;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32, micro: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_micro_opt(h, m, s, micro)
            .unwrap()
    }

    fn row(values: Vec<f64>) -> EmittedRow {
        let channels: Arc<[String]> = vec!["temperature".to_string(), "humidity".to_string()].into();
        EmittedRow::new(ts(3, 0, 0, 0), channels, values)
    }

    // -----------------------------------------------------------------------
    // Formatting tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_format_timestamp_whole_seconds() {
        assert_eq!(format_timestamp(ts(3, 4, 5, 0)), "2024-06-01T03:04:05");
    }

    #[test]
    fn test_format_timestamp_micros() {
        assert_eq!(
            format_timestamp(ts(3, 4, 5, 250_000)),
            "2024-06-01T03:04:05.250000"
        );
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(10.0), "10.0");
        assert_eq!(format_value(-0.5), "-0.5");
        assert_eq!(format_value(21.125), "21.125");
    }

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("say \"x\""), "\"say \"\"x\"\"\"");
    }

    #[test]
    fn test_quoted_header_reads_back() {
        let channels: Arc<[String]> = vec!["flow, l/min".to_string()].into();
        let r = EmittedRow::new(ts(0, 0, 0, 0), channels, vec![1.0]);
        assert_eq!(split_csv_line(&r.csv_header()), vec!["timestamp", "flow, l/min"]);
    }

    // -----------------------------------------------------------------------
    // EmittedRow tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_row_accessors() {
        let r = row(vec![21.5, 40.0]);
        assert_eq!(r.value("humidity"), Some(40.0));
        assert_eq!(r.value("pressure"), None);
        assert_eq!(
            r.fields().collect::<Vec<_>>(),
            vec![("temperature", 21.5), ("humidity", 40.0)]
        );
        assert_eq!(r.csv_header(), "timestamp,temperature,humidity");
        assert_eq!(r.csv_record(), "2024-06-01T03:00:00,21.5,40.0");
    }

    #[test]
    fn test_row_display() {
        let r = row(vec![21.5, 40.0]);
        assert_eq!(
            r.to_string(),
            "{timestamp: 2024-06-01T03:00:00, temperature: 21.5, humidity: 40.0}"
        );
    }

    // -----------------------------------------------------------------------
    // CsvFileSink tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_csv_sink_writes_header_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.csv");
        let mut sink = CsvFileSink::new(&path);

        sink.append(&row(vec![1.0, 2.0])).unwrap();
        sink.append(&row(vec![3.0, 4.0])).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "timestamp,temperature,humidity");
        assert_eq!(lines[2], "2024-06-01T03:00:00,3.0,4.0");
    }

    #[test]
    fn test_csv_sink_preserves_existing_records() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.csv");
        std::fs::write(&path, "timestamp,temperature,humidity\nold,0.0,0.0\n").unwrap();

        let mut sink = CsvFileSink::new(&path);
        sink.append(&row(vec![5.0, 6.0])).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "timestamp,temperature,humidity\nold,0.0,0.0\n2024-06-01T03:00:00,5.0,6.0\n"
        );
    }

    #[test]
    fn test_csv_sink_reports_path_on_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("missing-dir").join("out.csv");
        let mut sink = CsvFileSink::new(&path);
        match sink.append(&row(vec![1.0, 2.0])) {
            Err(SimError::Io { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_memory_sink_collects() {
        let mut sink = MemorySink::new();
        sink.append(&row(vec![1.0, 2.0])).unwrap();
        assert_eq!(sink.rows().len(), 1);
        assert_eq!(sink.describe(), "memory");
        assert_eq!(sink.into_rows()[0].values(), [1.0, 2.0]);
    }
}
