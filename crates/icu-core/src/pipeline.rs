//! End-to-end extraction over every feature family.
//!
//! The pipeline owns no table: the caller creates it with
//! [`ExtractionPipeline::new_table`] and passes it in by reference, so that
//! whatever has been merged so far is still available if a later step fails.
//!
//! # Run order
//!
//! 1. Demographics from the patients and admissions tables
//! 2. Each feature family: resolve dictionary labels, stream, reduce, merge
//! 3. GCS total completion from its components
//! 4. Organ-dysfunction sub-scores and total
//! 5. The external score file, when configured

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use icu_ingest::{
    StreamingOptions, load_demographics, load_scores, resolve_item_labels, stream_events,
};
use icu_model::{CodeSet, Cohort, ExtractionOptions, FeatureFamily, WindowPolicy};
use icu_standards::{FamilyMatcher, Vocabulary, mimic};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::derive::complete_gcs_total;
use crate::layout::{AGE, ETHNICITY, GENDER, SCORE_FILE_MAX, SCORE_FILE_MIN, output_layout};
use crate::reduce::{FamilyReducer, ReduceStats};
use crate::score::apply_organ_scores;
use crate::table::FeatureTable;
use crate::window::WindowIndex;

/// What happened to one feature family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FamilyOutcome {
    /// At least one cohort patient matched.
    Completed,
    /// The source was read but no cohort patient matched.
    Empty,
    /// The source could not be read; the family's columns keep defaults.
    Skipped { reason: String },
}

impl FamilyOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Empty => "empty",
            Self::Skipped { .. } => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FamilyReport {
    pub family: String,
    pub source: String,
    pub outcome: FamilyOutcome,
    pub patients_matched: usize,
    pub stats: ReduceStats,
}

impl FamilyReport {
    fn skipped(family: &FeatureFamily, reason: String) -> Self {
        Self {
            family: family.name.clone(),
            source: family.source.name.clone(),
            outcome: FamilyOutcome::Skipped { reason },
            patients_matched: 0,
            stats: ReduceStats::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub cohort_size: usize,
    pub undated_patients: usize,
    pub demographics_matched: usize,
    pub families: Vec<FamilyReport>,
    pub gcs_totals_filled: usize,
    pub scored_patients: usize,
    /// Patients with an external score; `None` when no score file was read.
    pub external_scores: Option<usize>,
}

impl RunReport {
    pub fn skipped_families(&self) -> usize {
        self.families
            .iter()
            .filter(|report| matches!(report.outcome, FamilyOutcome::Skipped { .. }))
            .count()
    }
}

enum Resolution {
    Ready(FeatureFamily),
    NoCodes,
    Unavailable(String),
}

pub struct ExtractionPipeline<'a> {
    data_root: PathBuf,
    cohort: &'a Cohort,
    vocabulary: &'a Vocabulary,
    options: ExtractionOptions,
    score_file: Option<PathBuf>,
    windows: WindowIndex,
}

impl<'a> ExtractionPipeline<'a> {
    pub fn new(
        data_root: impl Into<PathBuf>,
        cohort: &'a Cohort,
        vocabulary: &'a Vocabulary,
        options: ExtractionOptions,
    ) -> Self {
        let windows = WindowIndex::from_cohort(cohort, &options);
        Self {
            data_root: data_root.into(),
            cohort,
            vocabulary,
            options,
            score_file: None,
            windows,
        }
    }

    pub fn with_score_file(mut self, path: Option<PathBuf>) -> Self {
        self.score_file = path;
        self
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn options(&self) -> &ExtractionOptions {
        &self.options
    }

    /// An all-default table for the cohort with the full output layout.
    pub fn new_table(&self) -> Result<FeatureTable> {
        FeatureTable::with_layout(self.cohort, &output_layout(self.vocabulary))
    }

    fn chunk_size(&self, family: &FeatureFamily) -> usize {
        family.chunk_size.unwrap_or(match family.window {
            WindowPolicy::Observation => self.options.event_chunk_size,
            WindowPolicy::Unbounded => self.options.therapy_chunk_size,
        })
    }

    /// Replaces dictionary label sets with the item ids they resolve to.
    fn resolve(&self, family: &FeatureFamily) -> Resolution {
        if !family.has_unresolved_labels() {
            return Resolution::Ready(family.clone());
        }
        let mut resolved = family.clone();
        for feature in &mut resolved.features {
            let CodeSet::ItemLabels {
                dictionary,
                pattern,
            } = feature.codes.clone()
            else {
                continue;
            };
            let path = self.data_root.join(&dictionary);
            match resolve_item_labels(&path, &pattern) {
                Ok(ids) if ids.is_empty() => {
                    warn!(feature = %feature.name, pattern = %pattern, "no dictionary item matches");
                    return Resolution::NoCodes;
                }
                Ok(ids) => feature.codes = CodeSet::Items(ids),
                Err(err) => return Resolution::Unavailable(err.to_string()),
            }
        }
        Resolution::Ready(resolved)
    }

    /// Streams one family's source table and merges the reduction into
    /// `table`. Unreadable sources are reported, not raised.
    pub fn run_family(
        &self,
        family: &FeatureFamily,
        table: &mut FeatureTable,
    ) -> Result<FamilyReport> {
        let _span = info_span!("extract", family = %family.name).entered();
        let family = match self.resolve(family) {
            Resolution::Ready(family) => family,
            Resolution::NoCodes => {
                return Ok(FamilyReport {
                    family: family.name.clone(),
                    source: family.source.name.clone(),
                    outcome: FamilyOutcome::Empty,
                    patients_matched: 0,
                    stats: ReduceStats::default(),
                });
            }
            Resolution::Unavailable(reason) => {
                warn!(%reason, "dictionary unavailable; skipping family");
                return Ok(FamilyReport::skipped(family, reason));
            }
        };
        let matcher = FamilyMatcher::new(&family)
            .with_context(|| format!("invalid feature family {}", family.name))?;
        let streaming = StreamingOptions::default().with_chunk_size(self.chunk_size(&family));
        let opened = stream_events(&self.data_root, &family.source, family.code_kind, &streaming);
        let batches = match opened {
            Ok(batches) => batches,
            Err(err) => {
                warn!(error = %err, "source table unavailable; skipping family");
                return Ok(FamilyReport::skipped(&family, err.to_string()));
            }
        };

        let mut reducer = FamilyReducer::new(&family, matcher, &self.windows);
        reducer.reduce_batches(batches);
        let reduction = reducer.finish();
        table
            .merge_reduction(&reduction)
            .with_context(|| format!("failed to merge feature family {}", family.name))?;

        let patients_matched = reduction.patients_matched();
        let outcome = if reduction.stats.all_batches_failed() {
            warn!("no batch of the source could be read; skipping family");
            FamilyOutcome::Skipped {
                reason: format!("all {} batches failed to parse", reduction.stats.batches),
            }
        } else if patients_matched == 0 {
            FamilyOutcome::Empty
        } else {
            FamilyOutcome::Completed
        };
        let stats = reduction.stats;
        info!(
            patients = patients_matched,
            batches = stats.batches,
            failed_batches = stats.failed_batches,
            records = stats.records,
            kept = stats.kept,
            "feature family extracted"
        );
        for (feature, values) in &reduction.features {
            debug!(feature = %feature.name, patients = values.len(), "feature coverage");
        }
        Ok(FamilyReport {
            family: family.name.clone(),
            source: family.source.name.clone(),
            outcome,
            patients_matched,
            stats,
        })
    }

    /// Fills age, gender and ethnicity. Unreadable tables leave the columns
    /// missing.
    pub fn merge_demographics(&self, table: &mut FeatureTable) -> Result<usize> {
        let demographics = match load_demographics(&self.data_root, self.cohort) {
            Ok(demographics) => demographics,
            Err(err) => {
                warn!(error = %err, "demographics unavailable");
                return Ok(0);
            }
        };
        for (subject_id, row) in demographics.iter() {
            table.set_numeric(AGE, subject_id, row.age)?;
            table.set_text(GENDER, subject_id, row.gender.clone())?;
            table.set_text(ETHNICITY, subject_id, row.ethnicity.clone())?;
        }
        Ok(demographics.len())
    }

    /// Merges the external score file into `SOFA_score_{min,max}`.
    /// A missing or unreadable file leaves both columns missing.
    pub fn merge_external_scores(&self, table: &mut FeatureTable) -> Result<Option<usize>> {
        let Some(path) = &self.score_file else {
            return Ok(None);
        };
        let scores = match load_scores(path, self.cohort) {
            Ok(scores) => scores,
            Err(err) if err.is_not_found() => {
                warn!(path = %path.display(), "score file not found; score columns stay missing");
                return Ok(None);
            }
            Err(err) => {
                warn!(error = %err, "score file unreadable; score columns stay missing");
                return Ok(None);
            }
        };
        for (subject_id, range) in scores.iter() {
            table.set_numeric(SCORE_FILE_MIN, subject_id, range.min)?;
            table.set_numeric(SCORE_FILE_MAX, subject_id, range.max)?;
        }
        info!(patients = scores.len(), "external scores merged");
        Ok(Some(scores.len()))
    }

    /// Runs every step in order, calling `checkpoint` after each family.
    pub fn run<F>(&self, table: &mut FeatureTable, mut checkpoint: F) -> Result<RunReport>
    where
        F: FnMut(&FeatureTable, &FamilyReport) -> Result<()>,
    {
        let mut report = RunReport {
            cohort_size: self.cohort.len(),
            undated_patients: self.windows.undefined(),
            ..RunReport::default()
        };
        info!(
            patients = report.cohort_size,
            undated = report.undated_patients,
            families = self.vocabulary.len(),
            window_hours = self.options.window_hours,
            "starting extraction"
        );
        report.demographics_matched = self.merge_demographics(table)?;

        for family in self.vocabulary.families() {
            let family_report = self.run_family(family, table)?;
            checkpoint(table, &family_report)
                .with_context(|| format!("checkpoint after family {} failed", family.name))?;
            report.families.push(family_report);
        }

        report.gcs_totals_filled = complete_gcs_total(table)?;
        let vasopressors: Vec<&str> = mimic::VASOPRESSORS.iter().map(|(name, _)| *name).collect();
        report.scored_patients = apply_organ_scores(table, &vasopressors, &self.windows)?;
        report.external_scores = self.merge_external_scores(table)?;
        info!(
            skipped = report.skipped_families(),
            scored = report.scored_patients,
            "extraction finished"
        );
        Ok(report)
    }
}
