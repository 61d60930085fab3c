//! Source code to canonical feature matching.
//!
//! One [`FamilyMatcher`] is built per feature family before its table is
//! streamed. Lookups never fail: an unknown code simply yields no features.

use std::collections::HashMap;

use icu_model::{CodeKind, CodeSet, EventCode, FeatureFamily, normalize_hierarchical_code};

use crate::StandardsError;

/// Separator characters folded onto the ASCII hyphen before drug matching.
const HYPHEN_VARIANTS: &[char] = &[
    '\u{2010}', // hyphen
    '\u{2011}', // non-breaking hyphen
    '\u{2012}', // figure dash
    '\u{2013}', // en dash
    '\u{2014}', // em dash
    '\u{2212}', // minus sign
    '\u{fe63}', // small hyphen-minus
    '\u{ff0d}', // fullwidth hyphen-minus
];

/// Lower-cases a medication string, unifies hyphen variants and collapses
/// runs of whitespace.
pub fn normalize_drug_name(raw: &str) -> String {
    let unified: String = raw
        .chars()
        .map(|ch| if HYPHEN_VARIANTS.contains(&ch) { '-' } else { ch })
        .collect();
    let lowered = unified.to_lowercase();
    let mut normalized = String::with_capacity(lowered.len());
    for part in lowered.split_whitespace() {
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        normalized.push_str(part);
    }
    normalized
}

/// Ordered substring matcher over normalized drug names.
///
/// Targets are tried in configuration order and the first hit wins, so a
/// string mentioning two targets always resolves to the same feature.
#[derive(Debug, Clone, Default)]
pub struct DrugMatcher {
    targets: Vec<(String, usize)>,
}

impl DrugMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a target after all previously registered ones.
    pub fn push(&mut self, target: &str, feature: usize) {
        let normalized = normalize_drug_name(target);
        if normalized.is_empty() {
            return;
        }
        if self.targets.iter().any(|(existing, _)| *existing == normalized) {
            return;
        }
        self.targets.push((normalized, feature));
    }

    pub fn find(&self, raw: &str) -> Option<usize> {
        let normalized = normalize_drug_name(raw);
        if normalized.is_empty() {
            return None;
        }
        self.targets
            .iter()
            .find(|(target, _)| normalized.contains(target.as_str()))
            .map(|(_, feature)| *feature)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[derive(Debug, Clone)]
enum Strategy {
    Items(HashMap<i64, usize>),
    Prefixes(Vec<(String, usize)>),
    Names(DrugMatcher),
}

/// Matches event codes of one family onto the family's feature indices.
#[derive(Debug, Clone)]
pub struct FamilyMatcher {
    names: Vec<String>,
    strategy: Strategy,
}

impl FamilyMatcher {
    /// Builds the lookup structure for a validated family.
    ///
    /// Dictionary label sets must have been resolved into item ids first.
    pub fn new(family: &FeatureFamily) -> Result<Self, StandardsError> {
        family.validate()?;
        let names = family
            .features
            .iter()
            .map(|feature| feature.name.clone())
            .collect();
        let mut items = HashMap::new();
        let mut prefixes = Vec::new();
        let mut drugs = DrugMatcher::new();
        for (idx, feature) in family.features.iter().enumerate() {
            match &feature.codes {
                CodeSet::Items(ids) => {
                    for id in ids {
                        items.insert(*id, idx);
                    }
                }
                CodeSet::Prefixes(values) => {
                    for value in values {
                        let normalized = normalize_hierarchical_code(value);
                        if !normalized.is_empty() {
                            prefixes.push((normalized, idx));
                        }
                    }
                }
                CodeSet::Names(values) => {
                    for value in values {
                        drugs.push(value, idx);
                    }
                }
                CodeSet::ItemLabels { .. } => {
                    return Err(StandardsError::UnresolvedLabels {
                        family: family.name.clone(),
                        feature: feature.name.clone(),
                    });
                }
            }
        }
        let strategy = match family.code_kind {
            CodeKind::Item => Strategy::Items(items),
            CodeKind::Hierarchical => Strategy::Prefixes(prefixes),
            CodeKind::DrugName => Strategy::Names(drugs),
        };
        Ok(Self { names, strategy })
    }

    /// Appends the indices of every feature matching `code` to `out`.
    ///
    /// Item and drug lookups yield at most one feature. Prefix lookups yield
    /// each matching feature once, even when several of its prefixes match.
    pub fn matches_into(&self, code: &EventCode, out: &mut Vec<usize>) {
        match (&self.strategy, code) {
            (Strategy::Items(items), EventCode::Item(id)) => {
                if let Some(idx) = items.get(id) {
                    out.push(*idx);
                }
            }
            (Strategy::Items(items), EventCode::Text(text)) => {
                if let Some(idx) = text.trim().parse::<i64>().ok().and_then(|id| items.get(&id)) {
                    out.push(*idx);
                }
            }
            (Strategy::Prefixes(prefixes), code) => {
                let normalized = match code {
                    EventCode::Text(text) => normalize_hierarchical_code(text),
                    EventCode::Item(id) => id.to_string(),
                };
                if normalized.is_empty() {
                    return;
                }
                let start = out.len();
                for (prefix, idx) in prefixes {
                    if normalized.starts_with(prefix.as_str()) && !out[start..].contains(idx) {
                        out.push(*idx);
                    }
                }
            }
            (Strategy::Names(drugs), EventCode::Text(text)) => {
                if let Some(idx) = drugs.find(text) {
                    out.push(idx);
                }
            }
            (Strategy::Names(_), EventCode::Item(_)) => {}
        }
    }

    pub fn matches(&self, code: &EventCode) -> Vec<usize> {
        let mut out = Vec::new();
        self.matches_into(code, &mut out);
        out
    }

    /// Canonical feature names matching `code`; empty for unmapped codes.
    pub fn canonical_names(&self, code: &EventCode) -> Vec<&str> {
        self.matches(code)
            .into_iter()
            .map(|idx| self.names[idx].as_str())
            .collect()
    }

    pub fn feature_name(&self, idx: usize) -> Option<&str> {
        self.names.get(idx).map(String::as_str)
    }

    pub fn feature_count(&self) -> usize {
        self.names.len()
    }
}
