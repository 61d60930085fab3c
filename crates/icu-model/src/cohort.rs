use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::SubjectId;

/// A cohort member as handed over by cohort selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub subject_id: SubjectId,
    /// ICU admission time; `None` when it could not be read upstream.
    pub admission_time: Option<NaiveDateTime>,
    pub hospital_admission_id: Option<i64>,
}

impl Patient {
    pub fn new(subject_id: SubjectId, admission_time: Option<NaiveDateTime>) -> Self {
        Self {
            subject_id,
            admission_time,
            hospital_admission_id: None,
        }
    }

    pub fn with_hospital_admission(mut self, hadm_id: i64) -> Self {
        self.hospital_admission_id = Some(hadm_id);
        self
    }
}

/// The fixed set of patients every feature is computed for.
///
/// Holds exactly one [`Patient`] per subject, ordered by subject id. When
/// several rows for the same subject are inserted, the earliest admission is
/// retained; rows with an unknown admission time lose to any dated row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cohort {
    patients: BTreeMap<SubjectId, Patient>,
}

impl Cohort {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_patients(patients: impl IntoIterator<Item = Patient>) -> Self {
        let mut cohort = Self::new();
        for patient in patients {
            cohort.insert(patient);
        }
        cohort
    }

    /// Inserts a patient, keeping the first chronological admission.
    ///
    /// Returns `true` when the patient became the subject's row.
    pub fn insert(&mut self, patient: Patient) -> bool {
        match self.patients.entry(patient.subject_id) {
            Entry::Vacant(slot) => {
                slot.insert(patient);
                true
            }
            Entry::Occupied(mut slot) => {
                let earlier = match (patient.admission_time, slot.get().admission_time) {
                    (Some(new), Some(current)) => new < current,
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if earlier {
                    slot.insert(patient);
                }
                earlier
            }
        }
    }

    pub fn len(&self) -> usize {
        self.patients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patients.is_empty()
    }

    pub fn get(&self, subject_id: SubjectId) -> Option<&Patient> {
        self.patients.get(&subject_id)
    }

    pub fn contains(&self, subject_id: SubjectId) -> bool {
        self.patients.contains_key(&subject_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Patient> {
        self.patients.values()
    }

    pub fn subject_ids(&self) -> impl Iterator<Item = SubjectId> + '_ {
        self.patients.keys().copied()
    }
}

impl FromIterator<Patient> for Cohort {
    fn from_iter<I: IntoIterator<Item = Patient>>(iter: I) -> Self {
        Self::from_patients(iter)
    }
}
