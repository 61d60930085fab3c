use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::UpperBound;

/// Per-patient observation interval anchored at ICU admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub upper: UpperBound,
}

impl ObservationWindow {
    pub fn new(start: NaiveDateTime, duration: TimeDelta, upper: UpperBound) -> Self {
        Self {
            start,
            end: start + duration,
            upper,
        }
    }

    /// Whether `timestamp` falls inside the window. The start is always
    /// included; the end only with [`UpperBound::Inclusive`].
    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        if timestamp < self.start {
            return false;
        }
        match self.upper {
            UpperBound::Inclusive => timestamp <= self.end,
            UpperBound::Exclusive => timestamp < self.end,
        }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}
