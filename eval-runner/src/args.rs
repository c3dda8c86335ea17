use std::path::PathBuf;

use clap::Parser;

fn default_report_dir() -> PathBuf {
    PathBuf::from("./eval-runner/reports")
}

/// CLI for the memory-efficacy evaluation pass: aggregates recent `query_run`,
/// `memory_usage` and `citation` rows into the metrics described for C12.
#[derive(Debug, Clone, Parser)]
#[command(name = "eval-runner", about = "Aggregate memory-efficacy telemetry")]
pub struct EvalArgs {
    /// How many days back of query runs to analyze.
    #[arg(long, default_value_t = 30)]
    pub window_days: i64,

    /// Directory reports are written under (JSON summary).
    #[arg(long, default_value_os_t = default_report_dir())]
    pub report_dir: PathBuf,
}

pub fn parse() -> EvalArgs {
    EvalArgs::parse()
}
