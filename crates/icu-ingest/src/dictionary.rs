use std::collections::BTreeSet;
use std::path::Path;

use regex::RegexBuilder;
use tracing::debug;

use crate::csv_util::{get_i64, get_str, open_reader, read_headers, require_column};
use crate::error::IngestError;

/// Item ids whose `label` matches `pattern` (case-insensitive) in an item
/// dictionary such as `icu/d_items.csv`.
pub fn resolve_item_labels(path: &Path, pattern: &str) -> Result<BTreeSet<i64>, IngestError> {
    let regex = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| IngestError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let idx_item = require_column(&headers, "itemid", path)?;
    let idx_label = require_column(&headers, "label", path)?;

    let mut ids = BTreeSet::new();
    for row in reader.records() {
        let row = row.map_err(|e| IngestError::csv(path, &e))?;
        let Some(label) = get_str(&row, Some(idx_label)) else {
            continue;
        };
        if !regex.is_match(label) {
            continue;
        }
        if let Some(id) = get_i64(&row, Some(idx_item)) {
            ids.insert(id);
        }
    }
    debug!(pattern, matched = ids.len(), "resolved dictionary labels");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn matches_labels_case_insensitively() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d_items.csv");
        fs::write(
            &path,
            "itemid,label,abbreviation,linksto\n\
             225792,Invasive Ventilation,Invasive Ventilation,procedureevents\n\
             224385,Intubation,Intubation,procedureevents\n\
             225794,Non-invasive Ventilation,NIV,procedureevents\n\
             220045,Heart Rate,HR,chartevents\n",
        )
        .unwrap();
        let ids = resolve_item_labels(&path, "ventilat|intubat").unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![224385, 225792, 225794]);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("d_items.csv");
        fs::write(&path, "itemid,label\n").unwrap();
        assert!(matches!(
            resolve_item_labels(&path, "(unclosed"),
            Err(IngestError::Pattern { .. })
        ));
    }
}
