//! Organ-dysfunction (SOFA) sub-scores.
//!
//! Every sub-score is a step function onto 0..=4 where higher is worse.
//! A missing input yields `None`, never 0: "no data" and "no dysfunction"
//! must stay distinguishable all the way into the total.

use anyhow::Result;
use icu_model::SubjectId;
use serde::Serialize;

use crate::table::FeatureTable;
use crate::window::WindowIndex;

pub const RESPIRATION: &str = "SOFA_respiration";
pub const COAGULATION: &str = "SOFA_coagulation";
pub const LIVER: &str = "SOFA_liver";
pub const CARDIOVASCULAR: &str = "SOFA_cardiovascular";
pub const CNS: &str = "SOFA_cns";
pub const RENAL: &str = "SOFA_renal";
pub const TOTAL: &str = "SOFA_total";

/// Score columns in output order.
pub const SCORE_COLUMNS: &[&str] = &[
    RESPIRATION,
    COAGULATION,
    LIVER,
    CARDIOVASCULAR,
    CNS,
    RENAL,
    TOTAL,
];

/// FiO2 charted in percent (e.g. `40`) as a fraction (`0.4`).
pub fn fio2_fraction(fio2: f64) -> f64 {
    if fio2 > 1.0 { fio2 / 100.0 } else { fio2 }
}

/// PaO2/FiO2 ratio; `None` unless both are present and FiO2 is positive.
pub fn oxygenation_ratio(pao2: Option<f64>, fio2: Option<f64>) -> Option<f64> {
    let fraction = fio2_fraction(fio2?);
    if fraction <= 0.0 {
        return None;
    }
    Some(pao2? / fraction)
}

pub fn respiration(pao2_fio2: Option<f64>) -> Option<u8> {
    let ratio = pao2_fio2?;
    Some(if ratio >= 400.0 {
        0
    } else if ratio >= 300.0 {
        1
    } else if ratio >= 200.0 {
        2
    } else if ratio >= 100.0 {
        3
    } else {
        4
    })
}

pub fn coagulation(platelets: Option<f64>) -> Option<u8> {
    let platelets = platelets?;
    Some(if platelets >= 150.0 {
        0
    } else if platelets >= 100.0 {
        1
    } else if platelets >= 50.0 {
        2
    } else if platelets >= 20.0 {
        3
    } else {
        4
    })
}

pub fn liver(bilirubin: Option<f64>) -> Option<u8> {
    let bilirubin = bilirubin?;
    Some(if bilirubin < 1.2 {
        0
    } else if bilirubin < 1.9 {
        1
    } else if bilirubin < 5.9 {
        2
    } else if bilirubin < 11.9 {
        3
    } else {
        4
    })
}

/// Scored from the number of vasopressors given, not from a threshold
/// ladder: one agent already scores 2.
pub fn cardiovascular(active_vasopressors: Option<usize>) -> Option<u8> {
    Some(match active_vasopressors? {
        0 => 0,
        1 => 2,
        2 => 3,
        _ => 4,
    })
}

pub fn cns(gcs: Option<f64>) -> Option<u8> {
    let gcs = gcs?;
    Some(if gcs >= 15.0 {
        0
    } else if gcs >= 13.0 {
        1
    } else if gcs >= 10.0 {
        2
    } else if gcs >= 6.0 {
        3
    } else {
        4
    })
}

pub fn renal(creatinine: Option<f64>) -> Option<u8> {
    let creatinine = creatinine?;
    Some(if creatinine < 1.2 {
        0
    } else if creatinine < 1.9 {
        1
    } else if creatinine < 3.4 {
        2
    } else if creatinine < 4.9 {
        3
    } else {
        4
    })
}

/// Sum of the present sub-scores; `None` when none is present.
pub fn total(sub_scores: &[Option<u8>]) -> Option<u32> {
    sub_scores
        .iter()
        .flatten()
        .fold(None, |sum, score| Some(sum.unwrap_or(0) + u32::from(*score)))
}

/// Sub-scores of one patient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrganScores {
    pub respiration: Option<u8>,
    pub coagulation: Option<u8>,
    pub liver: Option<u8>,
    pub cardiovascular: Option<u8>,
    pub cns: Option<u8>,
    pub renal: Option<u8>,
}

/// Worst reduced values feeding the sub-scores.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreInputs {
    pub pao2_min: Option<f64>,
    pub fio2_max: Option<f64>,
    pub platelets_min: Option<f64>,
    pub bilirubin_max: Option<f64>,
    pub active_vasopressors: Option<usize>,
    pub gcs_min: Option<f64>,
    pub creatinine_max: Option<f64>,
}

impl OrganScores {
    pub fn from_inputs(inputs: &ScoreInputs) -> Self {
        Self {
            respiration: respiration(oxygenation_ratio(inputs.pao2_min, inputs.fio2_max)),
            coagulation: coagulation(inputs.platelets_min),
            liver: liver(inputs.bilirubin_max),
            cardiovascular: cardiovascular(inputs.active_vasopressors),
            cns: cns(inputs.gcs_min),
            renal: renal(inputs.creatinine_max),
        }
    }

    /// Sub-scores in [`SCORE_COLUMNS`] order, without the total.
    pub fn as_array(&self) -> [Option<u8>; 6] {
        [
            self.respiration,
            self.coagulation,
            self.liver,
            self.cardiovascular,
            self.cns,
            self.renal,
        ]
    }

    pub fn total(&self) -> Option<u32> {
        total(&self.as_array())
    }
}

/// Columns read by [`apply_organ_scores`].
pub const PAO2_MIN: &str = "PO2_min";
pub const FIO2_MAX: &str = "FiO2_max";
pub const PLATELETS_MIN: &str = "Platelets_min";
pub const BILIRUBIN_MAX: &str = "Bilirubin_max";
pub const GCS_TOTAL_MIN: &str = "GCS_Total_min";
pub const CREATININE_MAX: &str = "Creatinine_max";

/// Number of raised vasopressor flags, or `None` unless every flag column
/// was extracted and the subject has an observation window. Flags of
/// undated subjects are defaults, not observations.
fn active_vasopressors(
    table: &FeatureTable,
    vasopressors: &[&str],
    windows: &WindowIndex,
    subject_id: SubjectId,
) -> Option<usize> {
    if vasopressors.is_empty() || !vasopressors.iter().all(|name| table.is_completed(name)) {
        return None;
    }
    windows.window(subject_id)?;
    let mut active = 0usize;
    for name in vasopressors {
        if table.flag(name, subject_id)? {
            active += 1;
        }
    }
    Some(active)
}

/// Computes the sub-scores and total for every row from the reduced worst
/// values already in the table. Returns the number of rows with a total.
pub fn apply_organ_scores(
    table: &mut FeatureTable,
    vasopressors: &[&str],
    windows: &WindowIndex,
) -> Result<usize> {
    let rows: Vec<_> = table
        .subjects()
        .iter()
        .map(|subject_id| {
            let inputs = ScoreInputs {
                pao2_min: table.numeric(PAO2_MIN, *subject_id),
                fio2_max: table.numeric(FIO2_MAX, *subject_id),
                platelets_min: table.numeric(PLATELETS_MIN, *subject_id),
                bilirubin_max: table.numeric(BILIRUBIN_MAX, *subject_id),
                active_vasopressors: active_vasopressors(
                    table,
                    vasopressors,
                    windows,
                    *subject_id,
                ),
                gcs_min: table.numeric(GCS_TOTAL_MIN, *subject_id),
                creatinine_max: table.numeric(CREATININE_MAX, *subject_id),
            };
            (*subject_id, OrganScores::from_inputs(&inputs))
        })
        .collect();
    let mut scored = 0usize;
    for (subject_id, scores) in rows {
        let sub_scores = scores.as_array();
        for (column, score) in SCORE_COLUMNS.iter().zip(sub_scores) {
            table.set_numeric(column, subject_id, score.map(f64::from))?;
        }
        let total = scores.total();
        if total.is_some() {
            scored += 1;
        }
        table.set_numeric(TOTAL, subject_id, total.map(f64::from))?;
    }
    Ok(scored)
}
