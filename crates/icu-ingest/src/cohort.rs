#![deny(unsafe_code)]

use std::path::Path;

use icu_model::{Cohort, Patient, SubjectId};
use tracing::{info, info_span, warn};

use crate::csv_util::{get_i64, get_str, header_index, open_reader, read_headers, require_column};
use crate::error::IngestError;
use crate::timestamp::parse_timestamp;

/// Admission time columns accepted in a cohort table, in preference order.
pub const ADMISSION_COLUMNS: &[&str] = &["intime", "admission_time", "admittime"];

/// Loads the cohort table.
///
/// Requires `subject_id`; the admission time comes from the first of
/// [`ADMISSION_COLUMNS`] present and `hadm_id` is optional. Rows with an
/// unreadable subject id are skipped. A missing file or a table without any
/// patient is an error: nothing downstream can run without a cohort.
pub fn load_cohort(path: &Path) -> Result<Cohort, IngestError> {
    let _span = info_span!("cohort", path = %path.display()).entered();
    let mut reader = open_reader(path)?;
    let headers = read_headers(&mut reader, path)?;
    let idx_subject = require_column(&headers, "subject_id", path)?;
    let idx_admission = ADMISSION_COLUMNS
        .iter()
        .find_map(|name| header_index(&headers, name));
    let idx_hadm = header_index(&headers, "hadm_id");
    if idx_admission.is_none() {
        warn!("cohort table has no admission time column; windowed features will be missing");
    }

    let mut cohort = Cohort::new();
    let mut skipped = 0usize;
    let mut undated = 0usize;
    for row in reader.records() {
        let row = row.map_err(|e| IngestError::csv(path, &e))?;
        let Some(subject_id) = get_str(&row, Some(idx_subject))
            .and_then(|raw| raw.parse::<SubjectId>().ok())
        else {
            skipped += 1;
            continue;
        };
        let admission_time = idx_admission
            .and_then(|idx| row.get(idx))
            .and_then(parse_timestamp);
        if admission_time.is_none() {
            undated += 1;
        }
        let mut patient = Patient::new(subject_id, admission_time);
        if let Some(hadm_id) = get_i64(&row, idx_hadm) {
            patient = patient.with_hospital_admission(hadm_id);
        }
        cohort.insert(patient);
    }

    if cohort.is_empty() {
        return Err(IngestError::EmptyCohort {
            path: path.to_path_buf(),
        });
    }
    if skipped > 0 {
        warn!(skipped, "cohort rows without a valid subject id were skipped");
    }
    if undated > 0 {
        warn!(undated, "cohort rows without an admission time");
    }
    info!(patients = cohort.len(), "cohort loaded");
    Ok(cohort)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn keeps_first_admission_per_subject() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("patients.csv");
        fs::write(
            &path,
            "subject_id,hadm_id,stay_id,intime\n\
             1,20,300,2180-05-06 10:00:00\n\
             1,10,301,2180-01-01 08:00:00\n\
             2,30,302,\n",
        )
        .unwrap();
        let cohort = load_cohort(&path).unwrap();
        assert_eq!(cohort.len(), 2);
        let first = cohort.get(SubjectId::new(1)).unwrap();
        assert_eq!(first.hospital_admission_id, Some(10));
        assert!(cohort.get(SubjectId::new(2)).unwrap().admission_time.is_none());
    }

    #[test]
    fn empty_cohort_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("patients.csv");
        fs::write(&path, "subject_id,intime\n").unwrap();
        assert!(matches!(
            load_cohort(&path),
            Err(IngestError::EmptyCohort { .. })
        ));
    }

    #[test]
    fn missing_cohort_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = load_cohort(&dir.path().join("absent.csv")).unwrap_err();
        assert!(err.is_not_found());
    }
}
