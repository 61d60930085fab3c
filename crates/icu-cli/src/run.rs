//! Subcommand bodies, independent of argument parsing.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use icu_core::{ExtractionPipeline, FeatureTable, RunReport};
use icu_ingest::{SelectionOptions, SelectionSummary, load_cohort, select_first_stays};
use icu_model::ExtractionOptions;
use icu_output::{write_cohort, write_emergency_save, write_feature_table};
use icu_standards::Vocabulary;
use tracing::{debug, error, info};

/// ICU stay table under the data root.
pub const ICU_STAYS: &str = "icu/icustays.csv";

#[derive(Debug, Clone)]
pub struct SelectSettings {
    pub data_root: PathBuf,
    pub output: PathBuf,
    pub selection: SelectionOptions,
}

/// Selects the first qualifying ICU stay per subject and writes the cohort.
pub fn select(settings: &SelectSettings) -> Result<SelectionSummary> {
    let stays_path = settings.data_root.join(ICU_STAYS);
    let (stays, summary) = select_first_stays(&stays_path, &settings.selection)
        .with_context(|| format!("select cohort from {}", stays_path.display()))?;
    write_cohort(&settings.output, &stays)?;
    info!(
        selected = summary.selected,
        total = summary.total_stays,
        "cohort selected"
    );
    Ok(summary)
}

#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub data_root: PathBuf,
    pub cohort: PathBuf,
    pub output: PathBuf,
    /// Rewritten after every feature family when set.
    pub intermediate: Option<PathBuf>,
    pub score_file: Option<PathBuf>,
    pub vocabulary: Option<PathBuf>,
    pub options: ExtractionOptions,
}

/// Coverage of one output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCoverage {
    pub column: String,
    pub covered: usize,
}

#[derive(Debug)]
pub struct ExtractOutcome {
    pub output: PathBuf,
    pub rows: usize,
    pub report: RunReport,
    pub coverage: Vec<ColumnCoverage>,
    pub elapsed: Duration,
}

fn coverage(table: &FeatureTable) -> Vec<ColumnCoverage> {
    table
        .columns()
        .iter()
        .map(|column| ColumnCoverage {
            column: column.name.clone(),
            covered: column.values.coverage(),
        })
        .collect()
}

/// Writes what has been merged so far; failures are logged, not raised.
fn emergency_save(output: &Path, table: &FeatureTable) {
    match write_emergency_save(output, table) {
        Ok(path) => error!(path = %path.display(), "partial feature table saved"),
        Err(err) => error!(error = %format!("{err:#}"), "emergency save failed"),
    }
}

/// Runs the full pipeline and writes the feature table.
///
/// Once the table exists, any failure first writes an emergency save next to
/// the output and then returns the error.
pub fn extract(settings: &ExtractSettings) -> Result<ExtractOutcome> {
    let started = Instant::now();
    let vocabulary = Vocabulary::load(settings.vocabulary.as_deref())
        .context("load feature vocabulary")?;
    let cohort = load_cohort(&settings.cohort)
        .with_context(|| format!("load cohort {}", settings.cohort.display()))?;

    let pipeline = ExtractionPipeline::new(
        settings.data_root.clone(),
        &cohort,
        &vocabulary,
        settings.options.clone(),
    )
    .with_score_file(settings.score_file.clone());
    let mut table = pipeline.new_table()?;

    let run = pipeline.run(&mut table, |partial, family| {
        if let Some(path) = &settings.intermediate {
            write_feature_table(path, partial)
                .with_context(|| format!("save intermediate table {}", path.display()))?;
            debug!(family = %family.family, "intermediate table saved");
        }
        Ok(())
    });
    let report = match run {
        Ok(report) => report,
        Err(err) => {
            emergency_save(&settings.output, &table);
            return Err(err.context("feature extraction failed"));
        }
    };
    if let Err(err) = write_feature_table(&settings.output, &table) {
        emergency_save(&settings.output, &table);
        return Err(err.context("write feature table"));
    }

    let elapsed = started.elapsed();
    info!(
        rows = table.height(),
        output = %settings.output.display(),
        elapsed = ?elapsed,
        "features written"
    );
    Ok(ExtractOutcome {
        output: settings.output.clone(),
        rows: table.height(),
        coverage: coverage(&table),
        report,
        elapsed,
    })
}

/// Writes the run report as pretty-printed JSON.
pub fn write_report(path: &Path, report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("serialize run report")?;
    fs::write(path, json).with_context(|| format!("write run report {}", path.display()))?;
    Ok(())
}
