#![deny(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use icu_model::{ExposureSummary, FeatureDefinition, FeatureFamily, ReductionKind};
use serde::{Deserialize, Serialize};

use crate::error::StandardsError;
use crate::matcher::FamilyMatcher;
use crate::mimic;

/// On-disk vocabulary layout.
///
/// ```toml
/// include_builtin = true
///
/// [[families]]
/// name = "extra_labs"
/// code_kind = "item"
/// source = { name = "labevents", path = "hosp/labevents.csv", code_column = "itemid", time_column = "charttime", value_column = "valuenum" }
/// features = [{ name = "Albumin", reduction = "min-max", codes = { items = [50862] } }]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VocabularyFile {
    /// Prepend the built-in MIMIC-IV families before the ones listed here.
    #[serde(default)]
    pub include_builtin: bool,
    #[serde(default)]
    pub families: Vec<FeatureFamily>,
}

/// The validated set of feature families driving one extraction run.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    families: Vec<FeatureFamily>,
}

impl Vocabulary {
    pub fn new(families: Vec<FeatureFamily>) -> Result<Self, StandardsError> {
        let vocabulary = Self { families };
        vocabulary.validate()?;
        Ok(vocabulary)
    }

    /// Built-in families for the MIMIC-IV layout.
    pub fn mimic_iv() -> Self {
        Self {
            families: mimic::families(),
        }
    }

    pub fn from_file(file: VocabularyFile) -> Result<Self, StandardsError> {
        let mut families = if file.include_builtin {
            mimic::families()
        } else {
            Vec::new()
        };
        families.extend(file.families);
        Self::new(families)
    }

    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, StandardsError> {
        let file: VocabularyFile =
            toml::from_str(content).map_err(|source| StandardsError::Toml {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_file(file)
    }

    pub fn from_toml_path(path: &Path) -> Result<Self, StandardsError> {
        let content = std::fs::read_to_string(path).map_err(|e| StandardsError::io(path, e))?;
        Self::from_toml_str(&content, path)
    }

    /// Loads `path` when given, otherwise the built-in vocabulary.
    pub fn load(path: Option<&Path>) -> Result<Self, StandardsError> {
        match path {
            Some(path) => Self::from_toml_path(path),
            None => Ok(Self::mimic_iv()),
        }
    }

    /// Validates every family and checks that a feature name shared between
    /// families is reduced the same way everywhere.
    pub fn validate(&self) -> Result<(), StandardsError> {
        if self.families.is_empty() {
            return Err(StandardsError::Empty);
        }
        let mut seen_families = BTreeSet::new();
        let mut reductions: BTreeMap<&str, ReductionKind> = BTreeMap::new();
        for family in &self.families {
            family.validate()?;
            if !seen_families.insert(family.name.as_str()) {
                return Err(StandardsError::InvalidFamily(icu_model::ModelError::Message(
                    format!("feature family {} is defined twice", family.name),
                )));
            }
            for feature in &family.features {
                match reductions.get(feature.name.as_str()) {
                    Some(first) if *first != feature.reduction => {
                        return Err(StandardsError::ConflictingReduction {
                            feature: feature.name.clone(),
                            first: *first,
                            second: feature.reduction,
                        });
                    }
                    Some(_) => {}
                    None => {
                        reductions.insert(feature.name.as_str(), feature.reduction);
                    }
                }
            }
        }
        Ok(())
    }

    pub fn families(&self) -> &[FeatureFamily] {
        &self.families
    }

    pub fn family(&self, name: &str) -> Option<&FeatureFamily> {
        self.families.iter().find(|family| family.name == name)
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Distinct features across all families, in first-appearance order.
    pub fn features(&self) -> Vec<&FeatureDefinition> {
        let mut seen = BTreeSet::new();
        self.families
            .iter()
            .flat_map(|family| family.features.iter())
            .filter(|feature| seen.insert(feature.name.as_str()))
            .collect()
    }

    /// Distinct exposure summaries, in first-appearance order.
    pub fn summaries(&self) -> Vec<&ExposureSummary> {
        let mut seen = BTreeSet::new();
        self.families
            .iter()
            .filter_map(|family| family.summary.as_ref())
            .filter(|summary| seen.insert(summary.names_column.as_str()))
            .collect()
    }

    /// Feature output columns followed by summary text columns.
    pub fn output_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .features()
            .into_iter()
            .flat_map(FeatureDefinition::output_columns)
            .collect();
        for summary in self.summaries() {
            columns.push(summary.names_column.clone());
            columns.push(summary.sources_column.clone());
        }
        columns
    }

    /// Canonical feature names for a source code of the named family.
    ///
    /// Families whose item ids come from a dictionary cannot be looked up
    /// until those ids are resolved.
    pub fn canonical_names(
        &self,
        family: &str,
        code: &icu_model::EventCode,
    ) -> Result<Vec<String>, StandardsError> {
        let Some(family) = self.family(family) else {
            return Ok(Vec::new());
        };
        let matcher = FamilyMatcher::new(family)?;
        Ok(matcher
            .canonical_names(code)
            .into_iter()
            .map(str::to_string)
            .collect())
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::mimic_iv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_vocabulary_is_valid() {
        let vocabulary = Vocabulary::mimic_iv();
        vocabulary.validate().expect("valid builtin vocabulary");
        assert!(vocabulary.family("labs").is_some());
    }

    #[test]
    fn shared_antibiotic_columns_appear_once() {
        let columns = Vocabulary::mimic_iv().output_columns();
        let vancomycin = columns.iter().filter(|c| *c == "Vancomycin").count();
        assert_eq!(vancomycin, 1);
        let summaries = columns.iter().filter(|c| *c == "Antibiotics").count();
        assert_eq!(summaries, 1);
        assert_eq!(columns.last().map(String::as_str), Some("Antibiotic_sources"));
    }

    #[test]
    fn min_max_columns_keep_feature_order() {
        let columns = Vocabulary::mimic_iv().output_columns();
        assert_eq!(&columns[..4], [
            "Bilirubin_min",
            "Bilirubin_max",
            "Lactate_min",
            "Lactate_max"
        ]);
    }
}
