use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use icu_model::{Cohort, SubjectId};
use tracing::{info, warn};

use crate::csv_util::{
    get_f64, get_i64, get_str, get_string, header_index, open_reader, read_headers, require_column,
};
use crate::error::IngestError;
use crate::timestamp::parse_timestamp;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientDemographics {
    pub age: Option<f64>,
    pub gender: Option<String>,
    pub ethnicity: Option<String>,
}

/// Static attributes of cohort patients, keyed by subject.
#[derive(Debug, Clone, Default)]
pub struct Demographics {
    rows: BTreeMap<SubjectId, PatientDemographics>,
}

#[derive(Debug, Clone)]
struct AdmissionKey {
    admitted: Option<NaiveDateTime>,
    hadm_id: Option<i64>,
}

impl AdmissionKey {
    /// Earlier admission first; undated rows lose, ties go to the smaller id.
    fn precedes(&self, other: &Self) -> bool {
        match (self.admitted, other.admitted) {
            (Some(a), Some(b)) if a != b => a < b,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            _ => match (self.hadm_id, other.hadm_id) {
                (Some(a), Some(b)) => a < b,
                (Some(_), None) => true,
                _ => false,
            },
        }
    }
}

impl Demographics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, subject_id: SubjectId) -> Option<&PatientDemographics> {
        self.rows.get(&subject_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SubjectId, &PatientDemographics)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    pub fn set(&mut self, subject_id: SubjectId, row: PatientDemographics) {
        self.rows.insert(subject_id, row);
    }

    /// Reads `anchor_age` and `gender` from the patients table.
    pub fn read_patients(&mut self, path: &Path, cohort: &Cohort) -> Result<usize, IngestError> {
        let mut reader = open_reader(path)?;
        let headers = read_headers(&mut reader, path)?;
        let idx_subject = require_column(&headers, "subject_id", path)?;
        let idx_age = header_index(&headers, "anchor_age");
        let idx_gender = header_index(&headers, "gender");
        let mut matched = 0usize;
        for row in reader.records() {
            let row = row.map_err(|e| IngestError::csv(path, &e))?;
            let Some(subject_id) = get_str(&row, Some(idx_subject))
                .and_then(|raw| raw.parse::<SubjectId>().ok())
                .filter(|id| cohort.contains(*id))
            else {
                continue;
            };
            let entry = self.rows.entry(subject_id).or_default();
            entry.age = get_f64(&row, idx_age);
            entry.gender = get_string(&row, idx_gender);
            matched += 1;
        }
        Ok(matched)
    }

    /// Reads `race` (or the older `ethnicity` column) from each subject's
    /// earliest hospital admission.
    pub fn read_admissions(&mut self, path: &Path, cohort: &Cohort) -> Result<usize, IngestError> {
        let mut reader = open_reader(path)?;
        let headers = read_headers(&mut reader, path)?;
        let idx_subject = require_column(&headers, "subject_id", path)?;
        let idx_race =
            header_index(&headers, "race").or_else(|| header_index(&headers, "ethnicity"));
        let idx_admit = header_index(&headers, "admittime");
        let idx_hadm = header_index(&headers, "hadm_id");

        let mut earliest: BTreeMap<SubjectId, (AdmissionKey, Option<String>)> = BTreeMap::new();
        for row in reader.records() {
            let row = row.map_err(|e| IngestError::csv(path, &e))?;
            let Some(subject_id) = get_str(&row, Some(idx_subject))
                .and_then(|raw| raw.parse::<SubjectId>().ok())
                .filter(|id| cohort.contains(*id))
            else {
                continue;
            };
            let key = AdmissionKey {
                admitted: idx_admit.and_then(|idx| row.get(idx)).and_then(parse_timestamp),
                hadm_id: get_i64(&row, idx_hadm),
            };
            let race = get_string(&row, idx_race);
            match earliest.get(&subject_id) {
                Some((current, _)) if !key.precedes(current) => {}
                _ => {
                    earliest.insert(subject_id, (key, race));
                }
            }
        }
        let matched = earliest.len();
        for (subject_id, (_, race)) in earliest {
            self.rows.entry(subject_id).or_default().ethnicity = race;
        }
        Ok(matched)
    }
}

/// Demographics for the cohort from `hosp/patients.csv` and
/// `hosp/admissions.csv` under `data_root`. Either table may be absent; its
/// columns then stay missing.
pub fn load_demographics(data_root: &Path, cohort: &Cohort) -> Result<Demographics, IngestError> {
    let mut demographics = Demographics::new();
    let patients = data_root.join("hosp/patients.csv");
    match demographics.read_patients(&patients, cohort) {
        Ok(matched) => info!(matched, "patient attributes loaded"),
        Err(err) if err.is_not_found() => {
            warn!(path = %patients.display(), "patients table not found; age and gender stay missing");
        }
        Err(err) => return Err(err),
    }
    let admissions = data_root.join("hosp/admissions.csv");
    match demographics.read_admissions(&admissions, cohort) {
        Ok(matched) => info!(matched, "admission attributes loaded"),
        Err(err) if err.is_not_found() => {
            warn!(path = %admissions.display(), "admissions table not found; ethnicity stays missing");
        }
        Err(err) => return Err(err),
    }
    Ok(demographics)
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

    #[test]
    fn ethnicity_comes_from_earliest_admission() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("hosp")).unwrap();
        fs::write(
            dir.path().join("hosp/patients.csv"),
            "subject_id,gender,anchor_age,anchor_year\n1,F,64,2180\n2,M,51,2181\n9,M,30,2180\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("hosp/admissions.csv"),
            "subject_id,hadm_id,admittime,race\n\
             1,12,2180-05-01 10:00:00,ASIAN\n\
             1,11,2180-01-01 10:00:00,WHITE\n\
             2,22,2181-01-01 10:00:00,BLACK\n\
             2,21,2181-01-01 10:00:00,OTHER\n",
        )
        .unwrap();
        let demographics = load_demographics(dir.path(), &cohort()).unwrap();
        assert_eq!(demographics.len(), 2);
        let first = demographics.get(SubjectId::new(1)).unwrap();
        assert_eq!(first.age, Some(64.0));
        assert_eq!(first.gender.as_deref(), Some("F"));
        assert_eq!(first.ethnicity.as_deref(), Some("WHITE"));
        let second = demographics.get(SubjectId::new(2)).unwrap();
        assert_eq!(second.ethnicity.as_deref(), Some("OTHER"));
    }

    #[test]
    fn missing_tables_leave_columns_empty() {
        let dir = TempDir::new().unwrap();
        let demographics = load_demographics(dir.path(), &cohort()).unwrap();
        assert!(demographics.is_empty());
    }
}
