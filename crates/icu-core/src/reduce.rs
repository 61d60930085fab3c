//! Chunked event reduction.
//!
//! A [`FamilyReducer`] folds the batches of one source table into running
//! per-patient aggregates, one per feature of the family. Each batch is first
//! grouped on its own and then merged into the running state, so the result
//! does not depend on batch size or batch order.

use std::collections::{BTreeMap, BTreeSet};

use icu_ingest::IngestError;
use icu_model::{
    EventRecord, ExposureSummary, FeatureDefinition, FeatureFamily, ReductionKind, SubjectId,
    ValuePolicy, WindowPolicy,
};
use icu_standards::FamilyMatcher;
use serde::Serialize;
use tracing::{debug, warn};

use crate::window::WindowIndex;

const PROGRESS_EVERY: usize = 20;

/// Running minimum and maximum of one patient's values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MinMax {
    pub min: f64,
    pub max: f64,
}

impl MinMax {
    pub fn new(value: f64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    pub fn update(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Reduced values of one feature. Patients without a surviving record are
/// absent.
#[derive(Debug, Clone, PartialEq)]
pub enum ReducedValues {
    MinMax(BTreeMap<SubjectId, MinMax>),
    Presence(BTreeSet<SubjectId>),
    MaxDose(BTreeMap<SubjectId, f64>),
}

impl ReducedValues {
    pub fn empty(kind: ReductionKind) -> Self {
        match kind {
            ReductionKind::MinMax => Self::MinMax(BTreeMap::new()),
            ReductionKind::Presence => Self::Presence(BTreeSet::new()),
            ReductionKind::MaxDose => Self::MaxDose(BTreeMap::new()),
        }
    }

    pub fn kind(&self) -> ReductionKind {
        match self {
            Self::MinMax(_) => ReductionKind::MinMax,
            Self::Presence(_) => ReductionKind::Presence,
            Self::MaxDose(_) => ReductionKind::MaxDose,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::MinMax(values) => values.len(),
            Self::Presence(subjects) => subjects.len(),
            Self::MaxDose(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, subject_id: SubjectId) -> bool {
        match self {
            Self::MinMax(values) => values.contains_key(&subject_id),
            Self::Presence(subjects) => subjects.contains(&subject_id),
            Self::MaxDose(values) => values.contains_key(&subject_id),
        }
    }

    pub fn subjects(&self) -> Vec<SubjectId> {
        match self {
            Self::MinMax(values) => values.keys().copied().collect(),
            Self::Presence(subjects) => subjects.iter().copied().collect(),
            Self::MaxDose(values) => values.keys().copied().collect(),
        }
    }

    /// Folds one record into the aggregate. Returns whether it counted.
    fn observe(&mut self, subject_id: SubjectId, value: Option<f64>) -> bool {
        match (self, value) {
            (Self::MinMax(values), Some(value)) => {
                values
                    .entry(subject_id)
                    .and_modify(|current| current.update(value))
                    .or_insert_with(|| MinMax::new(value));
                true
            }
            (Self::Presence(subjects), _) => {
                subjects.insert(subject_id);
                true
            }
            (Self::MaxDose(values), Some(value)) if value > 0.0 => {
                values
                    .entry(subject_id)
                    .and_modify(|current| *current = current.max(value))
                    .or_insert(value);
                true
            }
            _ => false,
        }
    }

    /// Merges another aggregate of the same kind; the operation is
    /// commutative and associative.
    pub fn absorb(&mut self, other: Self) {
        match (self, other) {
            (Self::MinMax(values), Self::MinMax(other)) => {
                for (subject_id, range) in other {
                    values
                        .entry(subject_id)
                        .and_modify(|current| *current = current.merge(range))
                        .or_insert(range);
                }
            }
            (Self::Presence(subjects), Self::Presence(other)) => subjects.extend(other),
            (Self::MaxDose(values), Self::MaxDose(other)) => {
                for (subject_id, dose) in other {
                    values
                        .entry(subject_id)
                        .and_modify(|current| *current = current.max(dose))
                        .or_insert(dose);
                }
            }
            (current, other) => {
                warn!(
                    expected = ?current.kind(),
                    found = ?other.kind(),
                    "ignoring aggregate of a different reduction kind"
                );
            }
        }
    }
}

/// Record and batch counts of one family run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReduceStats {
    pub batches: usize,
    pub failed_batches: usize,
    pub records: usize,
    pub kept: usize,
    pub outside_cohort: usize,
    pub no_window: usize,
    pub outside_window: usize,
    pub invalid_value: usize,
    pub unmatched_code: usize,
}

impl ReduceStats {
    /// The source yielded batches but none of them could be read.
    pub fn all_batches_failed(&self) -> bool {
        self.batches > 0 && self.failed_batches == self.batches
    }
}

/// Output of one family: reduced values per feature plus the optional
/// exposure summary.
#[derive(Debug, Clone)]
pub struct FamilyReduction {
    pub family: String,
    pub source: String,
    pub features: Vec<(FeatureDefinition, ReducedValues)>,
    pub summary: Option<ExposureSummary>,
    /// Names of the matched features per patient, filled when the family
    /// carries an exposure summary.
    pub exposures: BTreeMap<SubjectId, BTreeSet<String>>,
    pub stats: ReduceStats,
}

impl FamilyReduction {
    /// Patients with at least one reduced value.
    pub fn patients_matched(&self) -> usize {
        let mut subjects = BTreeSet::new();
        for (_, values) in &self.features {
            subjects.extend(values.subjects());
        }
        subjects.len()
    }

    pub fn values(&self, feature: &str) -> Option<&ReducedValues> {
        self.features
            .iter()
            .find(|(definition, _)| definition.name == feature)
            .map(|(_, values)| values)
    }
}

/// Running reduction of one feature family.
pub struct FamilyReducer<'a> {
    family: &'a FeatureFamily,
    matcher: FamilyMatcher,
    windows: &'a WindowIndex,
    values: Vec<ReducedValues>,
    exposures: BTreeMap<SubjectId, BTreeSet<String>>,
    stats: ReduceStats,
    matched: Vec<usize>,
}

impl<'a> FamilyReducer<'a> {
    pub fn new(
        family: &'a FeatureFamily,
        matcher: FamilyMatcher,
        windows: &'a WindowIndex,
    ) -> Self {
        let values = family
            .features
            .iter()
            .map(|feature| ReducedValues::empty(feature.reduction))
            .collect();
        Self {
            family,
            matcher,
            windows,
            values,
            exposures: BTreeMap::new(),
            stats: ReduceStats::default(),
            matched: Vec::new(),
        }
    }

    pub fn stats(&self) -> ReduceStats {
        self.stats
    }

    /// Whether the record's patient, time and value make it eligible.
    fn admit(&mut self, record: &EventRecord) -> bool {
        if !self.windows.is_member(record.subject_id) {
            self.stats.outside_cohort += 1;
            return false;
        }
        let Some(window) = self.windows.window(record.subject_id) else {
            self.stats.no_window += 1;
            return false;
        };
        if self.family.window == WindowPolicy::Observation
            && !record.timestamp.is_some_and(|ts| window.contains(ts))
        {
            self.stats.outside_window += 1;
            return false;
        }
        if self.family.values == ValuePolicy::RequirePositive
            && !record.value.is_some_and(|value| value > 0.0)
        {
            self.stats.invalid_value += 1;
            return false;
        }
        true
    }

    /// Groups one batch and merges it into the running aggregates.
    pub fn reduce_batch(&mut self, batch: &[EventRecord]) {
        let mut partial: Vec<ReducedValues> = self
            .family
            .features
            .iter()
            .map(|feature| ReducedValues::empty(feature.reduction))
            .collect();
        for record in batch {
            self.stats.records += 1;
            if !self.admit(record) {
                continue;
            }
            self.matched.clear();
            self.matcher.matches_into(&record.code, &mut self.matched);
            if self.matched.is_empty() {
                self.stats.unmatched_code += 1;
                continue;
            }
            let mut counted = false;
            for idx in &self.matched {
                if !partial[*idx].observe(record.subject_id, record.value) {
                    continue;
                }
                counted = true;
                if self.family.summary.is_some() {
                    self.exposures
                        .entry(record.subject_id)
                        .or_default()
                        .insert(self.family.features[*idx].name.clone());
                }
            }
            if counted {
                self.stats.kept += 1;
            } else {
                self.stats.invalid_value += 1;
            }
        }
        for (running, batch_values) in self.values.iter_mut().zip(partial) {
            running.absorb(batch_values);
        }
        self.stats.batches += 1;
        if self.stats.batches % PROGRESS_EVERY == 0 {
            debug!(
                family = %self.family.name,
                batches = self.stats.batches,
                records = self.stats.records,
                kept = self.stats.kept,
                "reduction progress"
            );
        }
    }

    /// Counts an unreadable batch and moves on.
    pub fn skip_batch(&mut self, error: &IngestError) {
        self.stats.batches += 1;
        self.stats.failed_batches += 1;
        warn!(family = %self.family.name, %error, "skipping unreadable batch");
    }

    pub fn reduce_batches<I>(&mut self, batches: I)
    where
        I: IntoIterator<Item = Result<Vec<EventRecord>, IngestError>>,
    {
        for batch in batches {
            match batch {
                Ok(records) => self.reduce_batch(&records),
                Err(error) => self.skip_batch(&error),
            }
        }
    }

    pub fn finish(self) -> FamilyReduction {
        FamilyReduction {
            family: self.family.name.clone(),
            source: self.family.source.name.clone(),
            features: self
                .family
                .features
                .iter()
                .cloned()
                .zip(self.values)
                .collect(),
            summary: self.family.summary.clone(),
            exposures: self.exposures,
            stats: self.stats,
        }
    }
}
