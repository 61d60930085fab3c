//! The per-patient feature table.
//!
//! Rows are fixed at construction: one per cohort subject, in subject order.
//! Columns are declared up front with a kind that decides their default:
//! numeric and text cells start missing, flag cells start at 0. Every merge
//! is commutative (min, max, logical or, set union), so the order in which
//! families are merged does not change the final table.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::{Result, bail};
use icu_model::{Cohort, FeatureDefinition, SubjectId};
use serde::Serialize;

use crate::reduce::{FamilyReduction, MinMax, ReducedValues};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    /// Floating point, missing by default.
    Numeric,
    /// 0/1 indicator, 0 by default.
    Flag,
    /// Free text, missing by default.
    Text,
    /// Set of names rendered as a sorted, comma separated list.
    TextSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn numeric(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Numeric)
    }

    pub fn flag(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Flag)
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::Text)
    }

    pub fn text_set(name: impl Into<String>) -> Self {
        Self::new(name, ColumnKind::TextSet)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValues {
    Numeric(Vec<Option<f64>>),
    Flag(Vec<bool>),
    Text(Vec<Option<String>>),
    TextSet(Vec<BTreeSet<String>>),
}

impl ColumnValues {
    fn empty(kind: ColumnKind, rows: usize) -> Self {
        match kind {
            ColumnKind::Numeric => Self::Numeric(vec![None; rows]),
            ColumnKind::Flag => Self::Flag(vec![false; rows]),
            ColumnKind::Text => Self::Text(vec![None; rows]),
            ColumnKind::TextSet => Self::TextSet(vec![BTreeSet::new(); rows]),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Numeric(_) => ColumnKind::Numeric,
            Self::Flag(_) => ColumnKind::Flag,
            Self::Text(_) => ColumnKind::Text,
            Self::TextSet(_) => ColumnKind::TextSet,
        }
    }

    /// Cells carrying information: present values, raised flags, non-empty
    /// sets.
    pub fn coverage(&self) -> usize {
        match self {
            Self::Numeric(values) => values.iter().filter(|v| v.is_some()).count(),
            Self::Flag(values) => values.iter().filter(|v| **v).count(),
            Self::Text(values) => values.iter().filter(|v| v.is_some()).count(),
            Self::TextSet(values) => values.iter().filter(|v| !v.is_empty()).count(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableColumn {
    pub name: String,
    pub values: ColumnValues,
}

/// One row per cohort subject, one column per declared output.
#[derive(Debug, Clone)]
pub struct FeatureTable {
    subjects: Vec<SubjectId>,
    rows: HashMap<SubjectId, usize>,
    columns: Vec<TableColumn>,
    by_name: HashMap<String, usize>,
    completed: BTreeSet<String>,
}

fn fold_option(current: Option<f64>, next: f64, pick: fn(f64, f64) -> f64) -> Option<f64> {
    Some(current.map_or(next, |current| pick(current, next)))
}

impl FeatureTable {
    /// A table with every cohort subject and no feature column.
    pub fn new(cohort: &Cohort) -> Self {
        let subjects: Vec<SubjectId> = cohort.subject_ids().collect();
        let rows = subjects
            .iter()
            .enumerate()
            .map(|(idx, subject_id)| (*subject_id, idx))
            .collect();
        Self {
            subjects,
            rows,
            columns: Vec::new(),
            by_name: HashMap::new(),
            completed: BTreeSet::new(),
        }
    }

    pub fn with_layout(cohort: &Cohort, layout: &[ColumnSpec]) -> Result<Self> {
        let mut table = Self::new(cohort);
        for spec in layout {
            table.declare(&spec.name, spec.kind)?;
        }
        Ok(table)
    }

    /// Adds a column with its default values. Re-declaring a column with
    /// the same kind is a no-op.
    pub fn declare(&mut self, name: &str, kind: ColumnKind) -> Result<()> {
        if name.eq_ignore_ascii_case("subject_id") {
            bail!("subject_id is the row key and cannot be declared as a column");
        }
        if let Some(idx) = self.by_name.get(name) {
            let existing = self.columns[*idx].values.kind();
            if existing != kind {
                bail!("column {name} already declared as {existing:?}, not {kind:?}");
            }
            return Ok(());
        }
        self.by_name.insert(name.to_string(), self.columns.len());
        self.columns.push(TableColumn {
            name: name.to_string(),
            values: ColumnValues::empty(kind, self.subjects.len()),
        });
        Ok(())
    }

    pub fn height(&self) -> usize {
        self.subjects.len()
    }

    pub fn subjects(&self) -> &[SubjectId] {
        &self.subjects
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&TableColumn> {
        self.by_name.get(name).map(|idx| &self.columns[*idx])
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    fn row(&self, subject_id: SubjectId) -> Option<usize> {
        self.rows.get(&subject_id).copied()
    }

    fn values_mut(&mut self, name: &str) -> Result<&mut ColumnValues> {
        match self.by_name.get(name) {
            Some(idx) => Ok(&mut self.columns[*idx].values),
            None => bail!("column {name} is not part of the table layout"),
        }
    }

    pub fn numeric(&self, name: &str, subject_id: SubjectId) -> Option<f64> {
        let row = self.row(subject_id)?;
        match &self.column(name)?.values {
            ColumnValues::Numeric(values) => values[row],
            _ => None,
        }
    }

    pub fn flag(&self, name: &str, subject_id: SubjectId) -> Option<bool> {
        let row = self.row(subject_id)?;
        match &self.column(name)?.values {
            ColumnValues::Flag(values) => Some(values[row]),
            _ => None,
        }
    }

    /// Text of a text or text-set cell; sets are joined with `", "`.
    pub fn text(&self, name: &str, subject_id: SubjectId) -> Option<String> {
        let row = self.row(subject_id)?;
        match &self.column(name)?.values {
            ColumnValues::Text(values) => values[row].clone(),
            ColumnValues::TextSet(values) => render_text_set(&values[row]),
            _ => None,
        }
    }

    /// Overwrites one numeric cell. Unknown subjects are ignored.
    pub fn set_numeric(
        &mut self,
        name: &str,
        subject_id: SubjectId,
        value: Option<f64>,
    ) -> Result<()> {
        let Some(row) = self.row(subject_id) else {
            return Ok(());
        };
        match self.values_mut(name)? {
            ColumnValues::Numeric(values) => values[row] = value,
            other => bail!("column {name} is {:?}, not numeric", other.kind()),
        }
        Ok(())
    }

    /// Overwrites one text cell. Unknown subjects are ignored.
    pub fn set_text(
        &mut self,
        name: &str,
        subject_id: SubjectId,
        value: Option<String>,
    ) -> Result<()> {
        let Some(row) = self.row(subject_id) else {
            return Ok(());
        };
        match self.values_mut(name)? {
            ColumnValues::Text(values) => values[row] = value,
            other => bail!("column {name} is {:?}, not text", other.kind()),
        }
        Ok(())
    }

    fn merge_numeric(
        &mut self,
        name: &str,
        values: impl IntoIterator<Item = (SubjectId, f64)>,
        pick: fn(f64, f64) -> f64,
    ) -> Result<usize> {
        let rows: Vec<(usize, f64)> = values
            .into_iter()
            .filter_map(|(subject_id, value)| self.row(subject_id).map(|row| (row, value)))
            .collect();
        match self.values_mut(name)? {
            ColumnValues::Numeric(cells) => {
                for (row, value) in &rows {
                    cells[*row] = fold_option(cells[*row], *value, pick);
                }
            }
            other => bail!("column {name} is {:?}, not numeric", other.kind()),
        }
        Ok(rows.len())
    }

    /// Lowers `{name}_min` and raises `{name}_max` with the reduced ranges.
    pub fn merge_min_max(
        &mut self,
        feature: &FeatureDefinition,
        ranges: &BTreeMap<SubjectId, MinMax>,
    ) -> Result<usize> {
        self.merge_numeric(
            &feature.min_column(),
            ranges.iter().map(|(id, range)| (*id, range.min)),
            f64::min,
        )?;
        self.merge_numeric(
            &feature.max_column(),
            ranges.iter().map(|(id, range)| (*id, range.max)),
            f64::max,
        )
    }

    /// Raises the flag of every listed subject.
    pub fn merge_flags(&mut self, name: &str, subjects: &BTreeSet<SubjectId>) -> Result<usize> {
        let rows: Vec<usize> = subjects
            .iter()
            .filter_map(|subject_id| self.row(*subject_id))
            .collect();
        match self.values_mut(name)? {
            ColumnValues::Flag(cells) => {
                for row in &rows {
                    cells[*row] = true;
                }
            }
            other => bail!("column {name} is {:?}, not a flag", other.kind()),
        }
        Ok(rows.len())
    }

    pub fn merge_max(&mut self, name: &str, values: &BTreeMap<SubjectId, f64>) -> Result<usize> {
        self.merge_numeric(name, values.iter().map(|(id, v)| (*id, *v)), f64::max)
    }

    /// Adds names to the set cells of the listed subjects.
    pub fn merge_text_set<'a>(
        &mut self,
        name: &str,
        values: impl IntoIterator<Item = (SubjectId, &'a BTreeSet<String>)>,
    ) -> Result<usize> {
        let rows: Vec<(usize, &BTreeSet<String>)> = values
            .into_iter()
            .filter_map(|(subject_id, names)| self.row(subject_id).map(|row| (row, names)))
            .collect();
        match self.values_mut(name)? {
            ColumnValues::TextSet(cells) => {
                for (row, names) in &rows {
                    cells[*row].extend(names.iter().cloned());
                }
            }
            other => bail!("column {name} is {:?}, not a text set", other.kind()),
        }
        Ok(rows.len())
    }

    /// Merges every feature of a family reduction, plus its exposure
    /// summary, and marks the features as extracted unless no batch of the
    /// source could be read.
    pub fn merge_reduction(&mut self, reduction: &FamilyReduction) -> Result<()> {
        let extracted = !reduction.stats.all_batches_failed();
        for (feature, values) in &reduction.features {
            match values {
                ReducedValues::MinMax(ranges) => {
                    self.merge_min_max(feature, ranges)?;
                }
                ReducedValues::Presence(subjects) => {
                    self.merge_flags(&feature.name, subjects)?;
                }
                ReducedValues::MaxDose(doses) => {
                    self.merge_max(&feature.name, doses)?;
                }
            }
            if extracted {
                self.completed.insert(feature.name.clone());
            }
        }
        if let Some(summary) = &reduction.summary {
            self.merge_text_set(
                &summary.names_column,
                reduction.exposures.iter().map(|(id, names)| (*id, names)),
            )?;
            let source = BTreeSet::from([reduction.source.clone()]);
            self.merge_text_set(
                &summary.sources_column,
                reduction.exposures.keys().map(|id| (*id, &source)),
            )?;
        }
        Ok(())
    }

    /// Whether a feature's source was read successfully at least once.
    pub fn is_completed(&self, feature: &str) -> bool {
        self.completed.contains(feature)
    }

    pub fn mark_completed(&mut self, feature: &str) {
        self.completed.insert(feature.to_string());
    }

    pub fn coverage(&self, name: &str) -> Option<usize> {
        self.column(name).map(|column| column.values.coverage())
    }
}

/// Renders a text-set cell as written out: sorted, comma separated, missing
/// when empty.
pub fn render_text_set(values: &BTreeSet<String>) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(String::as_str).collect::<Vec<_>>().join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce::ReduceStats;
    use icu_model::{CodeSet, Patient};

    fn cohort() -> Cohort {
        Cohort::from_patients([
            Patient::new(SubjectId::new(2), None),
            Patient::new(SubjectId::new(1), None),
        ])
    }

    #[test]
    fn rows_follow_subject_order_and_defaults_hold() {
        let layout = [ColumnSpec::numeric("HR_min"), ColumnSpec::flag("Diabetes")];
        let table = FeatureTable::with_layout(&cohort(), &layout).unwrap();
        assert_eq!(table.subjects(), &[SubjectId::new(1), SubjectId::new(2)]);
        assert_eq!(table.numeric("HR_min", SubjectId::new(1)), None);
        assert_eq!(table.flag("Diabetes", SubjectId::new(1)), Some(false));
    }

    #[test]
    fn unknown_subjects_never_add_rows() {
        let mut table = FeatureTable::with_layout(&cohort(), &[ColumnSpec::flag("X")]).unwrap();
        let merged = table
            .merge_flags("X", &BTreeSet::from([SubjectId::new(1), SubjectId::new(99)]))
            .unwrap();
        assert_eq!(merged, 1);
        assert_eq!(table.height(), 2);
    }

    #[test]
    fn min_max_merge_keeps_extremes() {
        let feature = FeatureDefinition::min_max("Creatinine", CodeSet::items([50912]));
        let layout = [
            ColumnSpec::numeric("Creatinine_min"),
            ColumnSpec::numeric("Creatinine_max"),
        ];
        let mut table = FeatureTable::with_layout(&cohort(), &layout).unwrap();
        let subject = SubjectId::new(1);
        table
            .merge_min_max(&feature, &BTreeMap::from([(subject, MinMax { min: 1.0, max: 2.0 })]))
            .unwrap();
        table
            .merge_min_max(&feature, &BTreeMap::from([(subject, MinMax { min: 1.5, max: 3.0 })]))
            .unwrap();
        assert_eq!(table.numeric("Creatinine_min", subject), Some(1.0));
        assert_eq!(table.numeric("Creatinine_max", subject), Some(3.0));
    }

    #[test]
    fn conflicting_declaration_fails() {
        let mut table = FeatureTable::new(&cohort());
        table.declare("A", ColumnKind::Numeric).unwrap();
        table.declare("A", ColumnKind::Numeric).unwrap();
        assert!(table.declare("A", ColumnKind::Flag).is_err());
        assert!(table.declare("subject_id", ColumnKind::Numeric).is_err());
    }

    #[test]
    fn text_sets_render_sorted() {
        let mut table =
            FeatureTable::with_layout(&cohort(), &[ColumnSpec::text_set("Antibiotics")]).unwrap();
        let subject = SubjectId::new(2);
        let first = BTreeSet::from(["Vancomycin".to_string()]);
        let second = BTreeSet::from(["Cefepime".to_string(), "Vancomycin".to_string()]);
        table.merge_text_set("Antibiotics", [(subject, &first)]).unwrap();
        table.merge_text_set("Antibiotics", [(subject, &second)]).unwrap();
        assert_eq!(
            table.text("Antibiotics", subject).as_deref(),
            Some("Cefepime, Vancomycin")
        );
        assert_eq!(table.text("Antibiotics", SubjectId::new(1)), None);
    }

    fn vasopressor_reduction(stats: ReduceStats) -> FamilyReduction {
        FamilyReduction {
            family: "vasopressors".to_string(),
            source: "inputevents".to_string(),
            features: vec![(
                FeatureDefinition::presence("Norepinephrine", CodeSet::items([221906])),
                ReducedValues::Presence(BTreeSet::new()),
            )],
            summary: None,
            exposures: BTreeMap::new(),
            stats,
        }
    }

    #[test]
    fn unreadable_source_leaves_features_incomplete() {
        let mut table =
            FeatureTable::with_layout(&cohort(), &[ColumnSpec::flag("Norepinephrine")]).unwrap();
        let unreadable = ReduceStats {
            batches: 2,
            failed_batches: 2,
            ..ReduceStats::default()
        };
        table.merge_reduction(&vasopressor_reduction(unreadable)).unwrap();
        assert!(!table.is_completed("Norepinephrine"));

        let partial = ReduceStats {
            batches: 2,
            failed_batches: 1,
            ..ReduceStats::default()
        };
        table.merge_reduction(&vasopressor_reduction(partial)).unwrap();
        assert!(table.is_completed("Norepinephrine"));
    }
}
