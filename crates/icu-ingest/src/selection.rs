//! First-stay cohort selection from the ICU stay table.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDateTime;
use icu_model::{Cohort, Patient, SubjectId};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::csv_util::{
    get_f64, get_i64, get_str, get_string, header_index, open_reader, read_headers, require_column,
};
use crate::error::IngestError;
use crate::timestamp::parse_timestamp;

/// Adult intensive care units admitted by default.
pub const ADULT_ICUS: &[&str] = &[
    "Medical Intensive Care Unit (MICU)",
    "Surgical Intensive Care Unit (SICU)",
    "Trauma SICU",
    "Coronary Care Unit (CCU)",
    "Cardiac Vascular Intensive Care Unit (CVICU)",
    "Neuro Surgical Intensive Care Unit (Neuro SICU)",
    "Medical/Surgical Intensive Care Unit (MICU/SICU)",
    "Trauma SICU (TSICU)",
];

/// Minimum ICU length of stay in days (30 hours).
pub const DEFAULT_MIN_LOS_DAYS: f64 = 1.25;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionOptions {
    pub care_units: Vec<String>,
    pub min_los_days: f64,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            care_units: ADULT_ICUS.iter().map(|unit| (*unit).to_string()).collect(),
            min_los_days: DEFAULT_MIN_LOS_DAYS,
        }
    }
}

impl SelectionOptions {
    pub fn with_min_los_days(mut self, days: f64) -> Self {
        self.min_los_days = days;
        self
    }

    pub fn with_care_units(mut self, units: Vec<String>) -> Self {
        self.care_units = units;
        self
    }
}

/// One ICU stay row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcuStay {
    pub subject_id: SubjectId,
    pub hadm_id: Option<i64>,
    pub stay_id: Option<i64>,
    pub first_careunit: Option<String>,
    pub intime: Option<NaiveDateTime>,
    pub los: Option<f64>,
}

impl IcuStay {
    pub fn to_patient(&self) -> Patient {
        let patient = Patient::new(self.subject_id, self.intime);
        match self.hadm_id {
            Some(hadm_id) => patient.with_hospital_admission(hadm_id),
            None => patient,
        }
    }
}

/// Row counts after each selection step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSummary {
    pub total_stays: usize,
    pub adult_icu_stays: usize,
    pub long_enough_stays: usize,
    pub selected: usize,
}

/// Stays in the configured care units with `los >= min_los_days`, reduced
/// to the earliest stay per subject. Stays without an `intime` sort last.
pub fn select_first_stays(
    icustays: &Path,
    options: &SelectionOptions,
) -> Result<(Vec<IcuStay>, SelectionSummary), IngestError> {
    let _span = info_span!("select", path = %icustays.display()).entered();
    let mut reader = open_reader(icustays)?;
    let headers = read_headers(&mut reader, icustays)?;
    let idx_subject = require_column(&headers, "subject_id", icustays)?;
    let idx_unit = require_column(&headers, "first_careunit", icustays)?;
    let idx_los = require_column(&headers, "los", icustays)?;
    let idx_intime = require_column(&headers, "intime", icustays)?;
    let idx_hadm = header_index(&headers, "hadm_id");
    let idx_stay = header_index(&headers, "stay_id");

    let mut summary = SelectionSummary::default();
    let mut first: BTreeMap<SubjectId, IcuStay> = BTreeMap::new();
    for row in reader.records() {
        let row = row.map_err(|e| IngestError::csv(icustays, &e))?;
        summary.total_stays += 1;
        let unit = get_string(&row, Some(idx_unit));
        let admitted = unit
            .as_deref()
            .is_some_and(|unit| options.care_units.iter().any(|u| u == unit));
        if !admitted {
            continue;
        }
        summary.adult_icu_stays += 1;
        let los = get_f64(&row, Some(idx_los));
        if !los.is_some_and(|los| los >= options.min_los_days) {
            continue;
        }
        summary.long_enough_stays += 1;
        let Some(subject_id) =
            get_str(&row, Some(idx_subject)).and_then(|raw| raw.parse::<SubjectId>().ok())
        else {
            continue;
        };
        let stay = IcuStay {
            subject_id,
            hadm_id: get_i64(&row, idx_hadm),
            stay_id: get_i64(&row, idx_stay),
            first_careunit: unit,
            intime: row.get(idx_intime).and_then(parse_timestamp),
            los,
        };
        let replace = match first.get(&subject_id) {
            None => true,
            Some(current) => match (stay.intime, current.intime) {
                (Some(new), Some(existing)) => new < existing,
                (Some(_), None) => true,
                (None, _) => false,
            },
        };
        if replace {
            first.insert(subject_id, stay);
        }
    }
    summary.selected = first.len();
    info!(
        total = summary.total_stays,
        adult_icu = summary.adult_icu_stays,
        long_enough = summary.long_enough_stays,
        selected = summary.selected,
        "selected first ICU stays"
    );
    Ok((first.into_values().collect(), summary))
}

pub fn stays_to_cohort(stays: &[IcuStay]) -> Cohort {
    stays.iter().map(IcuStay::to_patient).collect()
}
