//! `synthstream analyze`: summarize a history file without generating.

use synthstream_core::{HistoryAnalysis, SimError, SimResult};

use super::load_history;

/// Run the analyze command.
pub fn run(history_path: &str, output_path: Option<&str>) -> SimResult<()> {
    let analysis = load_history(history_path)?;

    println!("History analysis: {history_path}");
    println!("  Channels:        {}", analysis.metadata.channels.len());
    println!("  Last timestamp:  {}", analysis.metadata.last_timestamp);
    println!(
        "  Median interval: {}s",
        analysis.metadata.median_interval_seconds
    );
    println!();

    for channel in &analysis.metadata.channels {
        for line in channel_block(&analysis, channel) {
            println!("{line}");
        }
    }

    if let Some(path) = output_path {
        let json = analysis.to_json_pretty()?;
        std::fs::write(path, json).map_err(|e| SimError::Io {
            path: path.into(),
            source: e,
        })?;
        println!("\nResults written to {path}");
    }
    Ok(())
}

/// Box-drawn summary for one channel.
fn channel_block(analysis: &HistoryAnalysis, channel: &str) -> Vec<String> {
    let mut lines = vec![format!("  ┌─ {channel}")];
    match analysis.channel_stats(channel) {
        Some(s) => {
            lines.push(format!(
                "  │ Level:  last={:.3} mean={:.3} std={:.3}",
                s.last_value, s.mean, s.std
            ));
            lines.push(format!(
                "  │ Steps:  mean={:+.4} std={:.4}",
                s.diff_mean, s.diff_std
            ));
        }
        None => lines.push("  │ (no statistics)".to_string()),
    }
    let hours: Vec<u32> = analysis
        .profile(channel)
        .map(|p| p.hours().collect())
        .unwrap_or_default();
    lines.push(format!(
        "  │ Hours:  {}/24 covered{}",
        hours.len(),
        hour_ranges(&hours)
            .map(|r| format!(" ({r})"))
            .unwrap_or_default()
    ));
    lines.push("  └─".to_string());
    lines
}

/// Compact hour list: `[0, 1, 2, 5, 7, 8]` → `0-2, 5, 7-8`.
fn hour_ranges(hours: &[u32]) -> Option<String> {
    let (&first, rest) = hours.split_first()?;
    let mut ranges = Vec::new();
    let (mut start, mut end) = (first, first);
    for &h in rest {
        if h == end + 1 {
            end = h;
        } else {
            ranges.push((start, end));
            start = h;
            end = h;
        }
    }
    ranges.push((start, end));
    Some(
        ranges
            .into_iter()
            .map(|(a, b)| {
                if a == b {
                    a.to_string()
                } else {
                    format!("{a}-{b}")
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthstream_core::{HistoricalTable, analyze};

    fn sample_analysis() -> HistoryAnalysis {
        let table = HistoricalTable::from_csv_str(
            "timestamp,temperature\n\
             2024-06-01T00:00:00,10.0\n\
             2024-06-01T01:00:00,12.0\n\
             2024-06-01T02:00:00,11.0\n",
        )
        .unwrap();
        analyze(&table).unwrap()
    }

    // -----------------------------------------------------------------------
    // hour_ranges tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_hour_ranges_empty() {
        assert_eq!(hour_ranges(&[]), None);
    }

    #[test]
    fn test_hour_ranges_merges_runs() {
        assert_eq!(
            hour_ranges(&[0, 1, 2, 5, 7, 8]).as_deref(),
            Some("0-2, 5, 7-8")
        );
        assert_eq!(hour_ranges(&[23]).as_deref(), Some("23"));
    }

    // -----------------------------------------------------------------------
    // channel_block tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_channel_block_layout() {
        let lines = channel_block(&sample_analysis(), "temperature");
        assert_eq!(lines.first().unwrap(), "  ┌─ temperature");
        assert_eq!(lines.last().unwrap(), "  └─");
        assert!(lines.iter().any(|l| l.contains("mean=11.000")));
        assert!(lines.iter().any(|l| l.contains("mean=+0.5000")));
        assert!(lines.iter().any(|l| l.contains("3/24 covered (0-2)")));
    }

    #[test]
    fn test_channel_block_unknown_channel() {
        let lines = channel_block(&sample_analysis(), "pressure");
        assert!(lines.iter().any(|l| l.contains("no statistics")));
        assert!(lines.iter().any(|l| l.contains("0/24 covered")));
    }

    // -----------------------------------------------------------------------
    // run tests
    // -----------------------------------------------------------------------

    #[test]
    fn test_run_writes_json() {
        let tmp = tempfile::tempdir().unwrap();
        let history = tmp.path().join("h.csv");
        let out = tmp.path().join("analysis.json");
        std::fs::write(
            &history,
            "timestamp,co2\n2024-06-01T00:00:00,400\n2024-06-01T00:01:00,410\n",
        )
        .unwrap();

        run(history.to_str().unwrap(), Some(out.to_str().unwrap())).unwrap();

        let json = std::fs::read_to_string(&out).unwrap();
        let parsed = HistoryAnalysis::from_json(&json).unwrap();
        assert_eq!(parsed.metadata.channels, vec!["co2"]);
        assert_eq!(parsed.metadata.median_interval_seconds, 60.0);
    }
}
