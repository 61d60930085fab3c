use anyhow::{Context, Result};
use icu_core::FeatureTable;
use icu_core::table::{ColumnValues, render_text_set};
use icu_ingest::IcuStay;
use polars::prelude::*;

/// Key column, always first.
pub const SUBJECT_ID: &str = "subject_id";

/// Columns of the cohort file written by cohort selection.
pub const COHORT_COLUMNS: &[&str] = &[
    SUBJECT_ID,
    "hadm_id",
    "stay_id",
    "first_careunit",
    "intime",
    "los",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn feature_column(name: &str, values: &ColumnValues) -> Column {
    let series = match values {
        ColumnValues::Numeric(cells) => Series::new(name.into(), cells.as_slice()),
        ColumnValues::Flag(cells) => {
            let flags: Vec<i32> = cells.iter().map(|raised| i32::from(*raised)).collect();
            Series::new(name.into(), flags)
        }
        ColumnValues::Text(cells) => Series::new(name.into(), cells.as_slice()),
        ColumnValues::TextSet(cells) => {
            let rendered: Vec<Option<String>> = cells.iter().map(render_text_set).collect();
            Series::new(name.into(), rendered)
        }
    };
    series.into_column()
}

/// One row per cohort subject: `subject_id` followed by every declared
/// column in layout order. Flags are written as 0/1 integers, text sets as
/// sorted comma separated lists.
pub fn feature_frame(table: &FeatureTable) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(table.columns().len() + 1);
    let subjects: Vec<i64> = table.subjects().iter().map(|id| id.get()).collect();
    columns.push(Series::new(SUBJECT_ID.into(), subjects).into_column());
    for column in table.columns() {
        columns.push(feature_column(&column.name, &column.values));
    }
    DataFrame::new(columns).context("build feature frame")
}

pub fn cohort_frame(stays: &[IcuStay]) -> Result<DataFrame> {
    let subject_ids: Vec<i64> = stays.iter().map(|stay| stay.subject_id.get()).collect();
    let hadm_ids: Vec<Option<i64>> = stays.iter().map(|stay| stay.hadm_id).collect();
    let stay_ids: Vec<Option<i64>> = stays.iter().map(|stay| stay.stay_id).collect();
    let units: Vec<Option<String>> = stays
        .iter()
        .map(|stay| stay.first_careunit.clone())
        .collect();
    let intimes: Vec<Option<String>> = stays
        .iter()
        .map(|stay| stay.intime.map(|ts| ts.format(TIMESTAMP_FORMAT).to_string()))
        .collect();
    let los: Vec<Option<f64>> = stays.iter().map(|stay| stay.los).collect();

    let columns = vec![
        Series::new(COHORT_COLUMNS[0].into(), subject_ids).into_column(),
        Series::new(COHORT_COLUMNS[1].into(), hadm_ids).into_column(),
        Series::new(COHORT_COLUMNS[2].into(), stay_ids).into_column(),
        Series::new(COHORT_COLUMNS[3].into(), units).into_column(),
        Series::new(COHORT_COLUMNS[4].into(), intimes).into_column(),
        Series::new(COHORT_COLUMNS[5].into(), los).into_column(),
    ];
    DataFrame::new(columns).context("build cohort frame")
}
