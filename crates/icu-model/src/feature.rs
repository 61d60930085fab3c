//! Canonical feature definitions.
//!
//! A [`FeatureFamily`] groups the canonical features that are read from the
//! same source table in a single pass. Each [`FeatureDefinition`] names one
//! clinical signal, the source codes that map onto it and how multiple
//! observations per patient are reduced.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::{ModelError, Result};

/// Aggregation strategy applied to the surviving rows of one patient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReductionKind {
    /// Running minimum and maximum of the value.
    MinMax,
    /// Whether any row survived.
    Presence,
    /// Running maximum of strictly positive values.
    MaxDose,
}

/// How the code column of a source table is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CodeKind {
    /// Numeric item ids, matched by exact set membership.
    Item,
    /// Diagnosis/procedure classification codes, matched by prefix.
    Hierarchical,
    /// Free-text medication names, matched by normalized substring.
    DrugName,
}

impl CodeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Hierarchical => "hierarchical",
            Self::DrugName => "drug-name",
        }
    }
}

/// Source codes mapping onto one canonical feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeSet {
    Items(BTreeSet<i64>),
    Prefixes(Vec<String>),
    /// Target names in priority order.
    Names(Vec<String>),
    /// Item ids whose dictionary label matches `pattern`, resolved at run time.
    ItemLabels { dictionary: String, pattern: String },
}

impl CodeSet {
    pub fn items(ids: impl IntoIterator<Item = i64>) -> Self {
        Self::Items(ids.into_iter().collect())
    }

    pub fn prefixes<S: Into<String>>(prefixes: impl IntoIterator<Item = S>) -> Self {
        Self::Prefixes(prefixes.into_iter().map(Into::into).collect())
    }

    pub fn names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self::Names(names.into_iter().map(Into::into).collect())
    }

    pub const fn kind(&self) -> CodeKind {
        match self {
            Self::Items(_) | Self::ItemLabels { .. } => CodeKind::Item,
            Self::Prefixes(_) => CodeKind::Hierarchical,
            Self::Names(_) => CodeKind::DrugName,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Items(ids) => ids.is_empty(),
            Self::Prefixes(values) | Self::Names(values) => {
                values.iter().all(|value| value.trim().is_empty())
            }
            Self::ItemLabels { pattern, .. } => pattern.trim().is_empty(),
        }
    }

    /// Number of registered codes; label patterns count as one.
    pub fn len(&self) -> usize {
        match self {
            Self::Items(ids) => ids.len(),
            Self::Prefixes(values) | Self::Names(values) => values.len(),
            Self::ItemLabels { .. } => 1,
        }
    }
}

/// Normalizes a diagnosis/procedure code for prefix comparison:
/// trimmed, upper-cased, with `.` separators removed.
pub fn normalize_hierarchical_code(code: &str) -> String {
    code.trim()
        .chars()
        .filter(|ch| *ch != '.')
        .map(|ch| ch.to_ascii_uppercase())
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureDefinition {
    pub name: String,
    pub codes: CodeSet,
    pub reduction: ReductionKind,
}

impl FeatureDefinition {
    pub fn new(name: impl Into<String>, codes: CodeSet, reduction: ReductionKind) -> Self {
        Self {
            name: name.into(),
            codes,
            reduction,
        }
    }

    pub fn min_max(name: impl Into<String>, codes: CodeSet) -> Self {
        Self::new(name, codes, ReductionKind::MinMax)
    }

    pub fn presence(name: impl Into<String>, codes: CodeSet) -> Self {
        Self::new(name, codes, ReductionKind::Presence)
    }

    pub fn max_dose(name: impl Into<String>, codes: CodeSet) -> Self {
        Self::new(name, codes, ReductionKind::MaxDose)
    }

    pub fn min_column(&self) -> String {
        format!("{}_min", self.name)
    }

    pub fn max_column(&self) -> String {
        format!("{}_max", self.name)
    }

    /// Output columns owned by this feature, in table order.
    pub fn output_columns(&self) -> Vec<String> {
        match self.reduction {
            ReductionKind::MinMax => vec![self.min_column(), self.max_column()],
            ReductionKind::Presence | ReductionKind::MaxDose => vec![self.name.clone()],
        }
    }
}

fn default_subject_column() -> String {
    "subject_id".to_string()
}

/// Location and column layout of a source event table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTable {
    /// Short name used in logs and provenance columns (e.g. `labevents`).
    pub name: String,
    /// Path relative to the data root (e.g. `hosp/labevents.csv`).
    pub path: String,
    #[serde(default = "default_subject_column")]
    pub subject_column: String,
    pub code_column: String,
    #[serde(default)]
    pub time_column: Option<String>,
    #[serde(default)]
    pub value_column: Option<String>,
}

impl SourceTable {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        code_column: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            subject_column: default_subject_column(),
            code_column: code_column.into(),
            time_column: None,
            value_column: None,
        }
    }

    pub fn with_time_column(mut self, column: impl Into<String>) -> Self {
        self.time_column = Some(column.into());
        self
    }

    pub fn with_value_column(mut self, column: impl Into<String>) -> Self {
        self.value_column = Some(column.into());
        self
    }
}

/// Whether rows are restricted to the patient's observation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowPolicy {
    #[default]
    Observation,
    Unbounded,
}

/// Whether rows must carry a strictly positive value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValuePolicy {
    #[default]
    RequirePositive,
    Ignore,
}

/// Text columns listing which features (and from which tables) a patient
/// was exposed to, e.g. the antibiotics a patient received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureSummary {
    pub names_column: String,
    pub sources_column: String,
}

/// Canonical features read from one source table in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureFamily {
    pub name: String,
    pub source: SourceTable,
    pub code_kind: CodeKind,
    #[serde(default)]
    pub window: WindowPolicy,
    #[serde(default)]
    pub values: ValuePolicy,
    /// Overrides the batch size chosen from the extraction options.
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub summary: Option<ExposureSummary>,
    pub features: Vec<FeatureDefinition>,
}

impl FeatureFamily {
    pub fn new(name: impl Into<String>, source: SourceTable, code_kind: CodeKind) -> Self {
        Self {
            name: name.into(),
            source,
            code_kind,
            window: WindowPolicy::default(),
            values: ValuePolicy::default(),
            chunk_size: None,
            summary: None,
            features: Vec::new(),
        }
    }

    pub fn with_window(mut self, window: WindowPolicy) -> Self {
        self.window = window;
        self
    }

    pub fn with_values(mut self, values: ValuePolicy) -> Self {
        self.values = values;
        self
    }

    pub fn with_summary(mut self, summary: ExposureSummary) -> Self {
        self.summary = Some(summary);
        self
    }

    pub fn with_feature(mut self, feature: FeatureDefinition) -> Self {
        self.features.push(feature);
        self
    }

    pub fn with_features(mut self, features: impl IntoIterator<Item = FeatureDefinition>) -> Self {
        self.features.extend(features);
        self
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureDefinition> {
        self.features.iter().find(|feature| feature.name == name)
    }

    /// Whether any feature still needs its item ids resolved from a dictionary.
    pub fn has_unresolved_labels(&self) -> bool {
        self.features
            .iter()
            .any(|feature| matches!(feature.codes, CodeSet::ItemLabels { .. }))
    }

    /// Checks the family invariants: named features, no duplicates, code sets
    /// matching the family's code kind, and no numeric code mapped to two
    /// features of the same family.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ModelError::Message("feature family without a name".to_string()));
        }
        let mut seen_names = BTreeSet::new();
        let mut owners: BTreeMap<i64, &str> = BTreeMap::new();
        for feature in &self.features {
            if feature.name.trim().is_empty() {
                return Err(ModelError::InvalidFeatureName(feature.name.clone()));
            }
            if !seen_names.insert(feature.name.as_str()) {
                return Err(ModelError::DuplicateFeature {
                    family: self.name.clone(),
                    feature: feature.name.clone(),
                });
            }
            let found = feature.codes.kind();
            if found != self.code_kind {
                return Err(ModelError::CodeKindMismatch {
                    family: self.name.clone(),
                    feature: feature.name.clone(),
                    expected: self.code_kind.as_str(),
                    found: found.as_str(),
                });
            }
            if feature.codes.is_empty() {
                return Err(ModelError::EmptyCodeSet {
                    family: self.name.clone(),
                    feature: feature.name.clone(),
                });
            }
            if let CodeSet::Items(ids) = &feature.codes {
                for id in ids {
                    if let Some(first) = owners.insert(*id, feature.name.as_str()) {
                        return Err(ModelError::DuplicateCode {
                            family: self.name.clone(),
                            code: id.to_string(),
                            first: first.to_string(),
                            second: feature.name.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chart_source() -> SourceTable {
        SourceTable::new("chartevents", "icu/chartevents.csv", "itemid")
            .with_time_column("charttime")
            .with_value_column("valuenum")
    }

    #[test]
    fn min_max_features_own_two_columns() {
        let feature = FeatureDefinition::min_max("Heart_Rate", CodeSet::items([220045]));
        assert_eq!(
            feature.output_columns(),
            vec!["Heart_Rate_min".to_string(), "Heart_Rate_max".to_string()]
        );
        let flag = FeatureDefinition::presence("Diabetes", CodeSet::prefixes(["E10"]));
        assert_eq!(flag.output_columns(), vec!["Diabetes".to_string()]);
    }

    #[test]
    fn rejects_numeric_code_mapped_twice() {
        let family = FeatureFamily::new("chart", chart_source(), CodeKind::Item)
            .with_feature(FeatureDefinition::min_max("A", CodeSet::items([1, 2])))
            .with_feature(FeatureDefinition::min_max("B", CodeSet::items([2, 3])));
        let err = family.validate().unwrap_err();
        assert!(matches!(err, ModelError::DuplicateCode { ref code, .. } if code == "2"));
    }

    #[test]
    fn repeated_code_inside_one_feature_is_fine() {
        let family = FeatureFamily::new("chart", chart_source(), CodeKind::Item).with_feature(
            FeatureDefinition::min_max("Systolic_BP", CodeSet::items([220050, 6701, 6701])),
        );
        assert!(family.validate().is_ok());
    }

    #[test]
    fn rejects_code_kind_mismatch_and_empty_sets() {
        let mismatch = FeatureFamily::new("chart", chart_source(), CodeKind::Item)
            .with_feature(FeatureDefinition::presence("X", CodeSet::prefixes(["A"])));
        assert!(matches!(
            mismatch.validate(),
            Err(ModelError::CodeKindMismatch { .. })
        ));

        let empty = FeatureFamily::new("chart", chart_source(), CodeKind::Item)
            .with_feature(FeatureDefinition::presence("X", CodeSet::items([])));
        assert!(matches!(empty.validate(), Err(ModelError::EmptyCodeSet { .. })));
    }

    #[test]
    fn hierarchical_codes_drop_separators() {
        assert_eq!(normalize_hierarchical_code(" t80.2 "), "T802");
        assert_eq!(normalize_hierarchical_code("K80.1"), "K801");
    }
}
