//! Command line arguments of `icu-features`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

#[derive(Parser)]
#[command(
    name = "icu-features",
    version,
    about = "Extract per-patient clinical features for an ICU cohort",
    long_about = "Extract per-patient clinical features for an ICU cohort.\n\n\
                  Reads MIMIC-IV style CSV tables, reduces lab, vital, diagnosis,\n\
                  procedure and medication events within each patient's observation\n\
                  window and writes one row per cohort patient."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Pipeline configuration file (TOML). Flags override its values.
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for humans, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Append logs to a file instead of writing to stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Prefix log lines with timestamps.
    #[arg(long = "log-timestamps", global = true)]
    pub log_timestamps: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Select the first adult ICU stay per patient and write the cohort file.
    Select(SelectArgs),

    /// Run the full extraction for a cohort and write the feature table.
    Extract(ExtractArgs),

    /// List the feature families, their canonical features and code sets.
    Vocabulary(VocabularyArgs),
}

#[derive(Parser)]
pub struct SelectArgs {
    /// Root directory of the source tables (contains `icu/icustays.csv`).
    #[arg(long = "data-root", value_name = "DIR")]
    pub data_root: Option<PathBuf>,

    /// Cohort file to write (default: patients.csv).
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Minimum ICU length of stay in days.
    #[arg(long = "min-los-days", value_name = "DAYS")]
    pub min_los_days: Option<f64>,
}

#[derive(Parser)]
pub struct ExtractArgs {
    /// Root directory of the source tables (contains `hosp/` and `icu/`).
    #[arg(long = "data-root", value_name = "DIR")]
    pub data_root: Option<PathBuf>,

    /// Cohort file with `subject_id` and admission time (default: patients.csv).
    #[arg(long = "cohort", value_name = "PATH")]
    pub cohort: Option<PathBuf>,

    /// Feature table to write (default: features.csv).
    #[arg(long = "output", short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Previously computed organ-dysfunction scores to merge.
    #[arg(long = "score-file", value_name = "PATH")]
    pub score_file: Option<PathBuf>,

    /// Feature vocabulary file replacing the built-in families.
    #[arg(long = "vocabulary", value_name = "PATH")]
    pub vocabulary: Option<PathBuf>,

    /// Rewrite the intermediate table after every feature family.
    #[arg(long = "save-intermediate")]
    pub save_intermediate: bool,

    /// Intermediate table path (default: features_intermediate.csv).
    #[arg(long = "intermediate", value_name = "PATH")]
    pub intermediate: Option<PathBuf>,

    /// Write the run report as JSON.
    #[arg(long = "report", value_name = "PATH")]
    pub report: Option<PathBuf>,

    /// Observation window length in hours.
    #[arg(long = "window-hours", value_name = "HOURS")]
    pub window_hours: Option<i64>,

    /// Drop events stamped exactly at the end of the window.
    #[arg(long = "exclusive-window-end")]
    pub exclusive_window_end: bool,

    /// Rows per batch for lab, chart and output events.
    #[arg(long = "chunk-size", value_name = "ROWS")]
    pub chunk_size: Option<usize>,

    /// Rows per batch for diagnosis, procedure and medication tables.
    #[arg(long = "therapy-chunk-size", value_name = "ROWS")]
    pub therapy_chunk_size: Option<usize>,
}

#[derive(Parser)]
pub struct VocabularyArgs {
    /// Feature vocabulary file to list instead of the built-in families.
    #[arg(long = "vocabulary", value_name = "PATH")]
    pub vocabulary: Option<PathBuf>,

    /// Only list this family.
    #[arg(long = "family", value_name = "NAME")]
    pub family: Option<String>,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
