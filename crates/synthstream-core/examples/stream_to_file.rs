//! Stream synthetic readings to a file.
//!
//! Builds a small history in memory, then appends twenty generated rows to a
//! CSV file.
//!
//! Run: `cargo run --example stream_to_file`

use synthstream_core::{
    CsvFileSink, GeneratorConfig, HistoricalTable, StopSignal, StreamGenerator, analyze,
};

const HISTORY: &str = "\
timestamp,temperature,humidity,air_quality
2024-06-01T00:00:00,18.2,71.0,22.0
2024-06-01T01:00:00,17.9,73.5,20.5
2024-06-01T02:00:00,17.5,75.2,19.0
2024-06-01T03:00:00,17.4,76.8,18.7
2024-06-01T04:00:00,17.8,75.1,21.3
";

fn main() {
    let output_path = "simulated_stream.csv";

    let table = HistoricalTable::from_csv_str(HISTORY).expect("Failed to parse history");
    let analysis = analyze(&table).expect("Failed to analyze history");
    println!(
        "Streaming 20 rows to {output_path} ({} channels, cadence {}s)",
        analysis.metadata.channels.len(),
        analysis.metadata.median_interval_seconds
    );

    let config = GeneratorConfig {
        interval_seconds: 0.05,
        max_rows: Some(20),
        ..Default::default()
    };
    let mut generator = StreamGenerator::new(analysis, config).expect("Invalid configuration");
    let mut sink = CsvFileSink::new(output_path);
    let summary = generator
        .run(&mut sink, &StopSignal::new())
        .expect("Simulation failed");

    println!(
        "Done. Wrote {} rows to {output_path}, last timestamp {}",
        summary.rows_emitted, summary.last_timestamp
    );
}
