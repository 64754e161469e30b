//! `synthstream run`: generate rows until Ctrl+C or a row limit.

use synthstream_core::{
    CsvFileSink, GeneratorConfig, SimResult, StopReason, StopSignal, StreamGenerator,
};

use super::{load_history, parse_method};

/// Options for the run command, borrowed from the parsed CLI.
pub struct RunCommandConfig<'a> {
    pub history_path: &'a str,
    pub output_path: &'a str,
    pub interval: f64,
    pub seed: u64,
    pub method: &'a str,
    pub real_time: bool,
    pub max_rows: Option<u64>,
}

impl RunCommandConfig<'_> {
    fn generator_config(&self) -> SimResult<GeneratorConfig> {
        let config = GeneratorConfig {
            interval_seconds: self.interval,
            seed: self.seed,
            method: parse_method(self.method)?,
            use_real_time: self.real_time,
            max_rows: self.max_rows,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Run the simulation command until `stop` is requested or the row limit hits.
pub fn run(cfg: RunCommandConfig<'_>, stop: &StopSignal) -> SimResult<()> {
    // Reject bad flags before touching the history file.
    let config = cfg.generator_config()?;
    let analysis = load_history(cfg.history_path)?;
    let channels = analysis.metadata.channels.clone();
    let mut generator = StreamGenerator::new(analysis, config)?;

    println!("Simulating stream");
    println!("  History:   {}", cfg.history_path);
    println!("  Channels:  {}", channels.join(", "));
    println!("  Method:    {}", generator.config().method);
    println!("  Seed:      {}", cfg.seed);
    println!("  Interval:  {}s", cfg.interval);
    if cfg.real_time {
        println!("  Clock:     real time");
    } else {
        println!("  Clock:     synthetic, +{}s per row", generator.cadence_seconds());
    }
    match cfg.max_rows {
        Some(n) => println!("  Rows:      {n}"),
        None => println!("  Rows:      until Ctrl+C"),
    }
    println!("  Output:    {}", cfg.output_path);
    println!();

    let mut sink = CsvFileSink::new(cfg.output_path);
    let summary = generator.run(&mut sink, stop)?;

    println!();
    match summary.stop_reason {
        StopReason::Cancelled => println!("Stopped by user."),
        StopReason::RowLimit => println!("Row limit reached."),
    }
    println!(
        "  {} row(s) appended to {}, last timestamp {}",
        summary.rows_emitted,
        sink.path().display(),
        summary.last_timestamp
    );
    Ok(())
}
