use std::fs;
use std::path::Path;

use icu_ingest::{
    IngestError, SelectionOptions, StreamingOptions, load_cohort, select_first_stays,
    stays_to_cohort, stream_events,
};
use icu_model::{CodeKind, EventCode, SourceTable, SubjectId};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, body).unwrap();
}

#[test]
fn selection_output_feeds_the_cohort() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "icu/icustays.csv",
        "subject_id,hadm_id,stay_id,first_careunit,intime,los\n\
         7,70,700,Surgical Intensive Care Unit (SICU),2150-04-02 08:00:00,3.2\n\
         8,80,800,Surgical Intensive Care Unit (SICU),2150-04-02 08:00:00,0.5\n",
    );
    let (stays, _) =
        select_first_stays(&dir.path().join("icu/icustays.csv"), &SelectionOptions::default())
            .unwrap();
    let cohort = stays_to_cohort(&stays);
    assert_eq!(cohort.subject_ids().collect::<Vec<_>>(), vec![SubjectId::new(7)]);
}

#[test]
fn cohort_accepts_admittime_column() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "cohort.csv",
        "subject_id,admittime\n10000032.0,2180-07-23 12:35:00\n",
    );
    let cohort = load_cohort(&dir.path().join("cohort.csv")).unwrap();
    let patient = cohort.get(SubjectId::new(10000032)).unwrap();
    assert!(patient.admission_time.is_some());
}

#[test]
fn diagnosis_codes_stream_as_text() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "hosp/diagnoses_icd.csv",
        "subject_id,hadm_id,seq_num,icd_code,icd_version\n1,10,1,K8010,10\n1,10,2,,10\n",
    );
    let source = SourceTable::new("diagnoses_icd", "hosp/diagnoses_icd.csv", "icd_code");
    let batches: Vec<_> = stream_events(
        dir.path(),
        &source,
        CodeKind::Hierarchical,
        &StreamingOptions::default(),
    )
    .unwrap()
    .collect::<Result<_, _>>()
    .unwrap();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 1);
    assert_eq!(batches[0][0].code, EventCode::Text("K8010".to_string()));
    assert_eq!(batches[0][0].timestamp, None);
}

#[test]
fn absent_source_table_is_not_found() {
    let dir = TempDir::new().unwrap();
    let source = SourceTable::new("emar", "hosp/emar.csv", "medication");
    let err = stream_events(
        dir.path(),
        &source,
        CodeKind::DrugName,
        &StreamingOptions::default(),
    )
    .err()
    .unwrap();
    assert!(err.is_not_found());
    assert!(matches!(err, IngestError::Io { .. }));
}
