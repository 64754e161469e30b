//! Historical table loading.
//!
//! A history file is a plain CSV with a header row. One column must be named
//! `timestamp`; every other column is a numeric channel. Rows may appear in
//! any order; the analyzer sorts them.
//!
//! # Accepted timestamp forms
//!
//! - RFC 3339 (`2024-05-01T13:00:00+02:00`); the offset is dropped and the
//!   wall-clock time kept
//! - `YYYY-MM-DD HH:MM:SS[.fraction]` and the same with a `T` separator
//! - `YYYY-MM-DD HH:MM` / `YYYY-MM-DDTHH:MM`
//! - `YYYY-MM-DD` (midnight)
//!
//! Empty cells and `NaN` are treated as missing values.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{SimError, SimResult};

/// Name of the column holding row timestamps.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// One historical observation: a timestamp plus one optional value per channel.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub timestamp: NaiveDateTime,
    /// Values in the same order as [`HistoricalTable::channels`]; `None` = missing.
    pub values: Vec<Option<f64>>,
}

/// An in-memory historical table, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalTable {
    channels: Vec<String>,
    rows: Vec<HistoryRow>,
}

impl HistoricalTable {
    /// Build a table from already-parsed parts.
    ///
    /// Rejects duplicate channel names, a channel named `timestamp`, and rows
    /// whose width does not match the channel list.
    pub fn new(channels: Vec<String>, rows: Vec<HistoryRow>) -> SimResult<Self> {
        for (i, name) in channels.iter().enumerate() {
            if name == TIMESTAMP_COLUMN {
                return Err(SimError::InvalidHistory(format!(
                    "'{TIMESTAMP_COLUMN}' cannot also be a channel"
                )));
            }
            if channels[..i].contains(name) {
                return Err(SimError::InvalidHistory(format!(
                    "duplicate column '{name}'"
                )));
            }
        }
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.values.len() != channels.len())
        {
            return Err(SimError::InvalidHistory(format!(
                "row {i} has {} values, expected {}",
                row.values.len(),
                channels.len()
            )));
        }
        Ok(Self { channels, rows })
    }

    /// Read and parse a history CSV from disk.
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SimError::InvalidHistory(format!(
                "history file not found: {}",
                path.display()
            )));
        }
        let text = std::fs::read_to_string(path).map_err(|e| SimError::io(path, e))?;
        Self::from_csv_str(&text)
    }

    /// Parse CSV text with a header row.
    pub fn from_csv_str(text: &str) -> SimResult<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l.trim_end_matches('\r')))
            .filter(|(_, l)| !l.trim().is_empty());

        let Some((_, header_line)) = lines.next() else {
            return Err(SimError::InvalidHistory("history has no header row".into()));
        };
        let header: Vec<String> = split_csv_line(header_line)
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect();

        let ts_col = header
            .iter()
            .position(|h| h == TIMESTAMP_COLUMN)
            .ok_or_else(|| {
                SimError::InvalidHistory(format!("missing '{TIMESTAMP_COLUMN}' column"))
            })?;
        let channels: Vec<String> = header
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != ts_col)
            .map(|(_, h)| h.clone())
            .collect();

        let mut rows = Vec::new();
        for (line_no, line) in lines {
            let fields = split_csv_line(line);
            if fields.len() != header.len() {
                return Err(SimError::InvalidHistory(format!(
                    "line {line_no}: expected {} fields, found {}",
                    header.len(),
                    fields.len()
                )));
            }

            let raw_ts = fields[ts_col].trim();
            let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
                SimError::InvalidHistory(format!(
                    "line {line_no}: unparseable timestamp '{raw_ts}'"
                ))
            })?;

            let mut values = Vec::with_capacity(channels.len());
            for (i, field) in fields.iter().enumerate() {
                if i == ts_col {
                    continue;
                }
                values.push(parse_cell(field, line_no, &header[i])?);
            }
            rows.push(HistoryRow { timestamp, values });
        }

        Self::new(channels, rows)
    }

    /// Channel names in header order.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Rows in file order.
    pub fn rows(&self) -> &[HistoryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Parse a timestamp in any of the accepted forms.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn parse_cell(raw: &str, line_no: usize, column: &str) -> SimResult<Option<f64>> {
    let s = raw.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(SimError::Computation(format!(
            "line {line_no}: column '{column}' has non-numeric value '{s}'"
        ))),
    }
}

/// Split one CSV line, honouring double-quoted fields and `""` escapes.
pub(crate) fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    // -----------------------------------------------------------------------
    // Timestamp parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_parse_timestamp_forms() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2024-03-01 14:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T14:05:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 14:05"), Some(expected));
        assert_eq!(parse_timestamp(" 2024-03-01T14:05 "), Some(expected));
    }

    #[test]
    fn test_parse_timestamp_fraction_and_offset() {
        let ts = parse_timestamp("2024-03-01 14:05:00.250").unwrap();
        assert_eq!(ts.nanosecond(), 250_000_000);

        // Offset is dropped, wall time is kept.
        let ts = parse_timestamp("2024-03-01T23:30:00+05:00").unwrap();
        assert_eq!(ts.hour(), 23);
    }

    #[test]
    fn test_parse_timestamp_date_only() {
        let ts = parse_timestamp("2024-03-01").unwrap();
        assert_eq!((ts.hour(), ts.minute()), (0, 0));
    }

    #[test]
    fn test_parse_timestamp_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    // -----------------------------------------------------------------------
    // CSV splitting
    // -----------------------------------------------------------------------

    #[test]
    fn test_split_plain() {
        assert_eq!(split_csv_line("a,b,,c"), vec!["a", "b", "", "c"]);
    }

    #[test]
    fn test_split_quoted() {
        assert_eq!(
            split_csv_line(r#""x,y","say ""hi""",3"#),
            vec!["x,y", r#"say "hi""#, "3"]
        );
    }

    // -----------------------------------------------------------------------
    // Table parsing
    // -----------------------------------------------------------------------

    #[test]
    fn test_from_csv_basic() {
        let csv = "timestamp,temperature,humidity\n\
                   2024-01-01 00:00:00,20.5,40\n\
                   2024-01-01 01:00:00,21.0,41.5\n";
        let table = HistoricalTable::from_csv_str(csv).unwrap();
        assert_eq!(table.channels(), ["temperature", "humidity"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[1].values, vec![Some(21.0), Some(41.5)]);
    }

    #[test]
    fn test_timestamp_column_anywhere() {
        let csv = "co2,timestamp\n400,2024-01-01T00:00:00\n";
        let table = HistoricalTable::from_csv_str(csv).unwrap();
        assert_eq!(table.channels(), ["co2"]);
        assert_eq!(table.rows()[0].values, vec![Some(400.0)]);
    }

    #[test]
    fn test_missing_cells_and_blank_lines() {
        let csv = "timestamp,a,b\r\n2024-01-01 00:00,,NaN\r\n\r\n2024-01-01 01:00,1,2\r\n";
        let table = HistoricalTable::from_csv_str(csv).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows()[0].values, vec![None, None]);
    }

    #[test]
    fn test_header_only_is_empty_table() {
        let table = HistoricalTable::from_csv_str("timestamp,a\n").unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn test_rejects_missing_timestamp_column() {
        let err = HistoricalTable::from_csv_str("time,a\n2024-01-01,1\n").unwrap_err();
        assert!(matches!(err, SimError::InvalidHistory(_)));
    }

    #[test]
    fn test_rejects_bad_timestamp() {
        let err = HistoricalTable::from_csv_str("timestamp,a\nnot-a-date,1\n").unwrap_err();
        match err {
            SimError::InvalidHistory(msg) => assert!(msg.contains("line 2")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rejects_non_numeric_cell() {
        let err = HistoricalTable::from_csv_str("timestamp,a\n2024-01-01,warm\n").unwrap_err();
        assert!(matches!(err, SimError::Computation(_)));
    }

    #[test]
    fn test_rejects_ragged_row() {
        let err = HistoricalTable::from_csv_str("timestamp,a,b\n2024-01-01,1\n").unwrap_err();
        assert!(matches!(err, SimError::InvalidHistory(_)));
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let err = HistoricalTable::from_csv_str("timestamp,a,a\n2024-01-01,1,2\n").unwrap_err();
        assert!(matches!(err, SimError::InvalidHistory(_)));
    }

    #[test]
    fn test_rejects_empty_input() {
        assert!(HistoricalTable::from_csv_str("").is_err());
        assert!(HistoricalTable::from_csv_str("\n\n").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let err = HistoricalTable::load(tmp.path().join("nope.csv")).unwrap_err();
        match err {
            SimError::InvalidHistory(msg) => assert!(msg.contains("nope.csv")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("historical.csv");
        std::fs::write(&path, "timestamp,pm25\n2024-01-01 00:00:00,12\n").unwrap();
        let table = HistoricalTable::load(&path).unwrap();
        assert_eq!(table.channels(), ["pm25"]);
    }
}
