//! Logging setup for the `icu-features` binary.
//!
//! Library crates only emit `tracing` events and spans; this module installs
//! the subscriber that formats them.
//!
//! # Log Levels
//!
//! - `error`: fatal errors, emergency saves
//! - `warn`: skipped batches, missing source tables, unreadable optional inputs
//! - `info`: per-family counts, run start and end
//! - `debug`: batch progress and per-feature coverage
//!
//! Row-level values are never logged.

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Crates whose events are shown at the configured level.
const WORKSPACE_CRATES: &[&str] = &[
    "icu_cli",
    "icu_core",
    "icu_ingest",
    "icu_model",
    "icu_output",
    "icu_standards",
];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level_filter: LevelFilter,
    /// Let `RUST_LOG` override `level_filter` when set.
    pub use_env_filter: bool,
    pub with_timestamps: bool,
    pub with_target: bool,
    /// Emit span close events (with timings) in JSON output.
    pub with_spans: bool,
    pub with_ansi: bool,
    pub format: LogFormat,
    /// Append to this file instead of writing to stderr.
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level_filter: LevelFilter::WARN,
            use_env_filter: true,
            with_timestamps: false,
            with_target: false,
            with_spans: true,
            with_ansi: true,
            format: LogFormat::default(),
            log_file: None,
        }
    }
}

impl LogConfig {
    #[must_use]
    pub fn with_level_filter(mut self, level_filter: LevelFilter) -> Self {
        self.level_filter = level_filter;
        self
    }

    #[must_use]
    pub fn with_timestamps(mut self, enable: bool) -> Self {
        self.with_timestamps = enable;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_log_file(mut self, path: Option<PathBuf>) -> Self {
        self.log_file = path;
        self
    }

    fn filter(&self) -> EnvFilter {
        let directives = default_directives(self.level_filter);
        if self.use_env_filter {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
        } else {
            EnvFilter::new(directives)
        }
    }

    fn layer(&self, writer: BoxMakeWriter) -> BoxedLayer {
        let base = fmt::layer()
            .with_writer(writer)
            .with_target(self.with_target);
        match (self.format, self.with_timestamps) {
            (LogFormat::Json, _) => {
                let spans = if self.with_spans {
                    FmtSpan::CLOSE
                } else {
                    FmtSpan::NONE
                };
                base.json().with_span_events(spans).boxed()
            }
            (LogFormat::Compact, true) => base.compact().with_ansi(self.with_ansi).boxed(),
            (LogFormat::Compact, false) => base
                .compact()
                .without_time()
                .with_ansi(self.with_ansi)
                .boxed(),
            (LogFormat::Pretty, true) => base.with_ansi(self.with_ansi).boxed(),
            (LogFormat::Pretty, false) => base.without_time().with_ansi(self.with_ansi).boxed(),
        }
    }
}

/// Installs the global subscriber. Call once at startup.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
pub fn init_logging(config: &LogConfig) -> io::Result<()> {
    let writer = match &config.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(io::stderr),
    };
    tracing_subscriber::registry()
        .with(config.layer(writer).with_filter(config.filter()))
        .init();
    Ok(())
}

/// Workspace crates at `level`, everything else at `warn` or quieter.
fn default_directives(level: LevelFilter) -> String {
    let level_name = |level: LevelFilter| level.to_string().to_lowercase();
    let crate_level = level_name(level);
    std::iter::once(level_name(level.min(LevelFilter::WARN)))
        .chain(
            WORKSPACE_CRATES
                .iter()
                .map(|krate| format!("{krate}={crate_level}")),
        )
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_crates_follow_the_level() {
        let directives = default_directives(LevelFilter::DEBUG);
        assert!(directives.starts_with("warn,"));
        assert!(directives.contains("icu_core=debug"));
        assert!(directives.contains("icu_ingest=debug"));
    }

    #[test]
    fn quiet_levels_apply_to_external_crates() {
        assert!(default_directives(LevelFilter::ERROR).starts_with("error,"));
    }

    #[test]
    fn off_silences_everything() {
        let directives = default_directives(LevelFilter::OFF);
        assert!(directives.starts_with("off,"));
        assert!(directives.contains("icu_cli=off"));
    }
}
