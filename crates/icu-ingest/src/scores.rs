//! Previously computed organ-dysfunction scores.

use std::collections::BTreeMap;
use std::path::Path;

use icu_model::{Cohort, SubjectId};
use tracing::{info, warn};

use crate::csv_util::{get_f64, get_str, header_index, open_reader, read_headers};
use crate::error::IngestError;

/// Lowest and highest score recorded for one subject.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ScoreRange {
    fn merge(&mut self, min: Option<f64>, max: Option<f64>) {
        self.min = fold(self.min, min, f64::min);
        self.max = fold(self.max, max, f64::max);
    }
}

fn fold(current: Option<f64>, next: Option<f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    match (current, next) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, b) => a.or(b),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoreTable {
    /// Source column(s) the scores were read from.
    pub source_columns: Vec<String>,
    rows: BTreeMap<SubjectId, ScoreRange>,
}

impl ScoreTable {
    pub fn get(&self, subject_id: SubjectId) -> Option<ScoreRange> {
        self.rows.get(&subject_id).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SubjectId, ScoreRange)> + '_ {
        self.rows.iter().map(|(id, range)| (*id, *range))
    }
}

enum ScoreColumns {
    Range { min: usize, max: usize },
    Single(usize),
}

fn resolve_columns(headers: &csv::StringRecord) -> Option<(ScoreColumns, Vec<String>)> {
    if let (Some(min), Some(max)) = (
        header_index(headers, "sofa_total_min"),
        header_index(headers, "sofa_total_max"),
    ) {
        return Some((
            ScoreColumns::Range { min, max },
            vec!["sofa_total_min".to_string(), "sofa_total_max".to_string()],
        ));
    }
    if let Some(idx) = header_index(headers, "sofa_total") {
        return Some((ScoreColumns::Single(idx), vec!["sofa_total".to_string()]));
    }
    headers
        .iter()
        .position(|h| h.to_ascii_lowercase().contains("sofa"))
        .map(|idx| (ScoreColumns::Single(idx), vec![headers[idx].trim().to_string()]))
}

/// Reads scores for cohort subjects from a score table keyed by
/// `subject_id`.
///
/// Uses `sofa_total_min`/`sofa_total_max` when both exist, otherwise
/// `sofa_total` for both bounds, otherwise the first column whose name
/// mentions `sofa`. Several rows for one subject are folded into their
/// overall range. A table without `subject_id` or without any score column
/// yields an empty result.
pub fn load_scores(path: &Path, cohort: &Cohort) -> Result<ScoreTable, IngestError> {
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let Some(idx_subject) = header_index(&headers, "subject_id") else {
        warn!(path = %path.display(), "score table has no subject_id column");
        return Ok(ScoreTable::default());
    };
    let Some((columns, source_columns)) = resolve_columns(&headers) else {
        warn!(path = %path.display(), "score table has no score column");
        return Ok(ScoreTable::default());
    };

    let mut table = ScoreTable {
        source_columns,
        rows: BTreeMap::new(),
    };
    for row in reader.records() {
        let row = row.map_err(|e| IngestError::csv(path, &e))?;
        let Some(subject_id) = get_str(&row, Some(idx_subject))
            .and_then(|raw| raw.parse::<SubjectId>().ok())
            .filter(|id| cohort.contains(*id))
        else {
            continue;
        };
        let (min, max) = match columns {
            ScoreColumns::Range { min, max } => (get_f64(&row, Some(min)), get_f64(&row, Some(max))),
            ScoreColumns::Single(idx) => {
                let value = get_f64(&row, Some(idx));
                (value, value)
            }
        };
        if min.is_none() && max.is_none() {
            continue;
        }
        table.rows.entry(subject_id).or_default().merge(min, max);
    }
    info!(
        patients = table.len(),
        columns = ?table.source_columns,
        "scores loaded"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use icu_model::Patient;
    use std::fs;
    use tempfile::TempDir;

    fn cohort() -> Cohort {
        Cohort::from_patients([
            Patient::new(SubjectId::new(1), None),
            Patient::new(SubjectId::new(2), None),
        ])
    }

    fn load(body: &str) -> ScoreTable {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sofa.csv");
        fs::write(&path, body).unwrap();
        load_scores(&path, &cohort()).unwrap()
    }

    #[test]
    fn prefers_explicit_range_columns() {
        let table = load("subject_id,sofa_total,sofa_total_min,sofa_total_max\n1,9,2,7\n");
        assert_eq!(
            table.get(SubjectId::new(1)),
            Some(ScoreRange {
                min: Some(2.0),
                max: Some(7.0)
            })
        );
    }

    #[test]
    fn single_total_fills_both_bounds() {
        let table = load("subject_id,sofa_total\n1,4\n1,6\n3,1\n");
        assert_eq!(table.len(), 1);
        let range = table.get(SubjectId::new(1)).unwrap();
        assert_eq!((range.min, range.max), (Some(4.0), Some(6.0)));
    }

    #[test]
    fn falls_back_to_any_sofa_column() {
        let table = load("subject_id,hadm_id,SOFA_24h\n2,5,3\n");
        assert_eq!(table.source_columns, vec!["SOFA_24h".to_string()]);
        assert_eq!(table.get(SubjectId::new(2)).unwrap().max, Some(3.0));
    }

    #[test]
    fn no_score_column_is_empty() {
        let table = load("subject_id,hadm_id\n1,5\n");
        assert!(table.is_empty());
    }
}
