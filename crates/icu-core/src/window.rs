use std::collections::HashMap;

use chrono::TimeDelta;
use icu_model::{Cohort, ExtractionOptions, ObservationWindow, Patient, SubjectId};

/// Observation window of one patient, or `None` when the admission time is
/// unknown.
pub fn observation_window(
    patient: &Patient,
    options: &ExtractionOptions,
) -> Option<ObservationWindow> {
    let start = patient.admission_time?;
    Some(ObservationWindow::new(
        start,
        TimeDelta::hours(options.window_hours),
        options.window_upper_bound,
    ))
}

/// Windows of every cohort member, computed once per run.
#[derive(Debug, Clone, Default)]
pub struct WindowIndex {
    windows: HashMap<SubjectId, Option<ObservationWindow>>,
}

impl WindowIndex {
    pub fn from_cohort(cohort: &Cohort, options: &ExtractionOptions) -> Self {
        let windows = cohort
            .iter()
            .map(|patient| (patient.subject_id, observation_window(patient, options)))
            .collect();
        Self { windows }
    }

    pub fn is_member(&self, subject_id: SubjectId) -> bool {
        self.windows.contains_key(&subject_id)
    }

    /// The subject's window; `None` for non-members and undated patients.
    pub fn window(&self, subject_id: SubjectId) -> Option<&ObservationWindow> {
        self.windows.get(&subject_id).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Cohort members without a usable window.
    pub fn undefined(&self) -> usize {
        self.windows.values().filter(|w| w.is_none()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use icu_model::UpperBound;

    #[test]
    fn window_spans_configured_hours() {
        let start = NaiveDate::from_ymd_opt(2180, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap();
        let patient = Patient::new(SubjectId::new(1), Some(start));
        let window = observation_window(&patient, &ExtractionOptions::default()).unwrap();
        assert_eq!(window.end - window.start, TimeDelta::hours(30));
        assert_eq!(window.upper, UpperBound::Inclusive);
    }

    #[test]
    fn undated_patients_have_no_window() {
        let cohort = Cohort::from_patients([Patient::new(SubjectId::new(1), None)]);
        let index = WindowIndex::from_cohort(&cohort, &ExtractionOptions::default());
        assert!(index.is_member(SubjectId::new(1)));
        assert!(index.window(SubjectId::new(1)).is_none());
        assert_eq!(index.undefined(), 1);
    }
}
