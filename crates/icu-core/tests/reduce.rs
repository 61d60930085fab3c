use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use icu_core::{FamilyReducer, FamilyReduction, ReducedValues, WindowIndex};
use icu_model::{
    CodeKind, CodeSet, Cohort, EventRecord, ExposureSummary, ExtractionOptions, FeatureDefinition,
    FeatureFamily, Patient, SourceTable, SubjectId, ValuePolicy,
};
use icu_standards::FamilyMatcher;
use proptest::prelude::*;

fn admission() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2180, 6, 1)
        .and_then(|date| date.and_hms_opt(8, 0, 0))
        .expect("valid timestamp")
}

fn cohort() -> Cohort {
    Cohort::from_patients([
        Patient::new(SubjectId::new(1), Some(admission())),
        Patient::new(SubjectId::new(2), Some(admission() + TimeDelta::hours(5))),
        Patient::new(SubjectId::new(3), None),
    ])
}

fn family() -> FeatureFamily {
    family_with(ValuePolicy::Ignore)
}

fn family_with(values: ValuePolicy) -> FeatureFamily {
    let source = SourceTable::new("events", "events.csv", "itemid")
        .with_time_column("charttime")
        .with_value_column("value");
    FeatureFamily::new("mixed", source, CodeKind::Item)
        .with_values(values)
        .with_summary(ExposureSummary {
            names_column: "Exposures".to_string(),
            sources_column: "Exposure_sources".to_string(),
        })
        .with_feature(FeatureDefinition::min_max("Lactate", CodeSet::items([1, 11])))
        .with_feature(FeatureDefinition::presence("Ventilated", CodeSet::items([2])))
        .with_feature(FeatureDefinition::max_dose("Heparin_dose", CodeSet::items([3])))
}

fn reduce(family: &FeatureFamily, batches: &[Vec<EventRecord>]) -> FamilyReduction {
    let cohort = cohort();
    let windows = WindowIndex::from_cohort(&cohort, &ExtractionOptions::default());
    let matcher = FamilyMatcher::new(family).expect("matcher");
    let mut reducer = FamilyReducer::new(family, matcher, &windows);
    for batch in batches {
        reducer.reduce_batch(batch);
    }
    reducer.finish()
}

fn record() -> impl Strategy<Value = EventRecord> {
    (
        1i64..=4,
        prop::option::weighted(0.9, -120i64..2_400),
        prop::sample::select(vec![1i64, 2, 3, 11, 99]),
        prop::option::weighted(0.8, -20i32..200),
    )
        .prop_map(|(subject, minutes, item, value)| {
            EventRecord::item(
                SubjectId::new(subject),
                minutes.map(|m| admission() + TimeDelta::minutes(m)),
                item,
                value.map(|v| f64::from(v) / 4.0),
            )
        })
}

proptest! {
    #[test]
    fn reduction_is_independent_of_batching(
        records in prop::collection::vec(record(), 0..200),
        chunk in 1usize..50,
        seed in any::<u64>(),
        values in prop::sample::select(vec![ValuePolicy::Ignore, ValuePolicy::RequirePositive]),
    ) {
        let family = family_with(values);
        let whole = reduce(&family, std::slice::from_ref(&records));

        let mut shuffled = records.clone();
        let len = shuffled.len();
        if len > 1 {
            let mut state = seed;
            for idx in (1..len).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let pick = (state >> 33) as usize % (idx + 1);
                shuffled.swap(idx, pick);
            }
        }
        let mut batches: Vec<Vec<EventRecord>> =
            shuffled.chunks(chunk).map(<[EventRecord]>::to_vec).collect();
        batches.reverse();
        let chunked = reduce(&family, &batches);

        prop_assert_eq!(&whole.features, &chunked.features);
        prop_assert_eq!(&whole.exposures, &chunked.exposures);
        prop_assert_eq!(whole.stats.kept, chunked.stats.kept);
        prop_assert_eq!(whole.stats.records, chunked.stats.records);
    }

    #[test]
    fn min_max_bounds_every_kept_value(
        records in prop::collection::vec(record(), 1..100),
    ) {
        let family = family();
        let reduction = reduce(&family, std::slice::from_ref(&records));
        let Some(ReducedValues::MinMax(ranges)) = reduction.values("Lactate") else {
            panic!("lactate is a min-max feature");
        };
        for range in ranges.values() {
            prop_assert!(range.min <= range.max);
        }
        prop_assert!(!ranges.contains_key(&SubjectId::new(3)));
        prop_assert!(!ranges.contains_key(&SubjectId::new(4)));
    }

    #[test]
    fn positive_policy_keeps_only_positive_values(
        records in prop::collection::vec(record(), 1..100),
    ) {
        let family = family_with(ValuePolicy::RequirePositive);
        let reduction = reduce(&family, std::slice::from_ref(&records));
        let Some(ReducedValues::MinMax(ranges)) = reduction.values("Lactate") else {
            panic!("lactate is a min-max feature");
        };
        for range in ranges.values() {
            prop_assert!(range.min > 0.0);
        }
        let Some(ReducedValues::Presence(present)) = reduction.values("Ventilated") else {
            panic!("ventilated is a presence feature");
        };
        for subject_id in present {
            let positive = records.iter().any(|record| {
                record.subject_id == *subject_id
                    && record.value.is_some_and(|value| value > 0.0)
            });
            prop_assert!(positive);
        }
    }
}

#[test]
fn window_edges_are_inclusive_by_default() {
    let start = admission();
    let p1 = SubjectId::new(1);
    let records = vec![
        EventRecord::item(p1, Some(start - TimeDelta::minutes(1)), 1, Some(9.0)),
        EventRecord::item(p1, Some(start), 1, Some(2.0)),
        EventRecord::item(p1, Some(start + TimeDelta::hours(30)), 1, Some(4.0)),
        EventRecord::item(
            p1,
            Some(start + TimeDelta::hours(30) + TimeDelta::seconds(1)),
            1,
            Some(8.0),
        ),
        EventRecord::item(p1, None, 1, Some(7.0)),
    ];
    let reduction = reduce(&family(), &[records]);
    let Some(ReducedValues::MinMax(ranges)) = reduction.values("Lactate") else {
        panic!("lactate is a min-max feature");
    };
    let range = ranges[&p1];
    assert_eq!((range.min, range.max), (2.0, 4.0));
    assert_eq!(reduction.stats.outside_window, 3);
}

#[test]
fn zero_and_negative_values_never_reach_min_max() {
    let start = admission();
    let p1 = SubjectId::new(1);
    let records = vec![
        EventRecord::item(p1, Some(start), 1, Some(0.0)),
        EventRecord::item(p1, Some(start), 1, Some(-5.0)),
        EventRecord::item(p1, Some(start), 11, Some(1.5)),
        EventRecord::item(p1, Some(start), 1, None),
    ];
    let reduction = reduce(&family_with(ValuePolicy::RequirePositive), &[records]);
    let Some(ReducedValues::MinMax(ranges)) = reduction.values("Lactate") else {
        panic!("lactate is a min-max feature");
    };
    let range = ranges[&p1];
    assert_eq!((range.min, range.max), (1.5, 1.5));
    assert_eq!(reduction.stats.invalid_value, 3);
    assert_eq!(reduction.stats.kept, 1);
}

#[test]
fn exposures_name_each_matched_feature() {
    let start = admission();
    let records = vec![
        EventRecord::item(SubjectId::new(1), Some(start), 2, None),
        EventRecord::item(SubjectId::new(1), Some(start), 3, Some(0.5)),
        EventRecord::item(SubjectId::new(2), Some(start + TimeDelta::hours(6)), 3, Some(0.0)),
    ];
    let reduction = reduce(&family(), &[records]);
    let names: Vec<&str> = reduction.exposures[&SubjectId::new(1)]
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(names, vec!["Heparin_dose", "Ventilated"]);
    assert!(!reduction.exposures.contains_key(&SubjectId::new(2)));
    assert_eq!(reduction.patients_matched(), 1);
}
