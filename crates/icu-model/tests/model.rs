//! Tests for icu-model types.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use icu_model::{
    CodeKind, CodeSet, Cohort, ExtractionOptions, FeatureFamily, ObservationWindow, Patient,
    ReductionKind, SubjectId, UpperBound, ValuePolicy, WindowPolicy,
};

fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2180, 7, day)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

#[test]
fn cohort_keeps_first_admission_per_subject() {
    let cohort = Cohort::from_patients([
        Patient::new(SubjectId::new(1), Some(at(5, 8, 0))).with_hospital_admission(200),
        Patient::new(SubjectId::new(1), Some(at(3, 8, 0))).with_hospital_admission(100),
        Patient::new(SubjectId::new(2), None),
        Patient::new(SubjectId::new(2), Some(at(9, 0, 0))),
    ]);

    assert_eq!(cohort.len(), 2);
    let first = cohort.get(SubjectId::new(1)).unwrap();
    assert_eq!(first.hospital_admission_id, Some(100));
    assert_eq!(
        cohort.get(SubjectId::new(2)).unwrap().admission_time,
        Some(at(9, 0, 0))
    );
}

#[test]
fn cohort_iterates_in_subject_order() {
    let cohort: Cohort = [3, 1, 2]
        .into_iter()
        .map(|id| Patient::new(SubjectId::new(id), None))
        .collect();
    let ids: Vec<i64> = cohort.subject_ids().map(SubjectId::get).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn inclusive_window_keeps_the_end_instant() {
    let window = ObservationWindow::new(at(1, 0, 0), TimeDelta::hours(30), UpperBound::Inclusive);
    assert!(window.contains(at(1, 0, 0)));
    assert!(window.contains(at(2, 6, 0)));
    assert!(!window.contains(at(2, 6, 1)));
    assert!(!window.contains(at(1, 0, 0) - TimeDelta::minutes(1)));
}

#[test]
fn exclusive_window_drops_the_end_instant() {
    let window = ObservationWindow::new(at(1, 0, 0), TimeDelta::hours(30), UpperBound::Exclusive);
    assert!(window.contains(at(2, 5, 59)));
    assert!(!window.contains(at(2, 6, 0)));
}

#[test]
fn extraction_options_default_and_partial_toml() {
    let options = ExtractionOptions::default();
    assert_eq!(options.window_hours, 30);
    assert_eq!(options.window_upper_bound, UpperBound::Inclusive);

    let parsed: ExtractionOptions =
        toml::from_str("window_upper_bound = \"exclusive\"\nevent_chunk_size = 10\n").unwrap();
    assert_eq!(parsed.window_upper_bound, UpperBound::Exclusive);
    assert_eq!(parsed.event_chunk_size, 10);
    assert_eq!(parsed.window_hours, 30);
}

#[test]
fn feature_family_reads_from_toml() {
    let family: FeatureFamily = toml::from_str(
        r#"
name = "therapy"
code_kind = "item"
window = "unbounded"
values = "ignore"

[source]
name = "procedureevents"
path = "icu/procedureevents.csv"
code_column = "itemid"

[[features]]
name = "Mechanical_Ventilation"
reduction = "presence"
codes = { item_labels = { dictionary = "icu/d_items.csv", pattern = "ventilat|intubat" } }
"#,
    )
    .unwrap();

    assert_eq!(family.code_kind, CodeKind::Item);
    assert_eq!(family.window, WindowPolicy::Unbounded);
    assert_eq!(family.values, ValuePolicy::Ignore);
    assert_eq!(family.source.subject_column, "subject_id");
    assert!(family.has_unresolved_labels());
    assert_eq!(family.features[0].reduction, ReductionKind::Presence);
    assert!(matches!(family.features[0].codes, CodeSet::ItemLabels { .. }));
    family.validate().unwrap();
}
