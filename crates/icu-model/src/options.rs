//! Options controlling feature extraction.

use serde::{Deserialize, Serialize};

/// Whether an event stamped exactly at the window end is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpperBound {
    /// Keep events at the end instant (`start <= t <= end`).
    #[default]
    Inclusive,
    /// Drop events at the end instant (`start <= t < end`).
    Exclusive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionOptions {
    /// Length of the observation window after ICU admission.
    pub window_hours: i64,

    /// Inclusivity of the window end.
    pub window_upper_bound: UpperBound,

    /// Rows per batch for lab, chart and output events.
    pub event_chunk_size: usize,

    /// Rows per batch for diagnosis, procedure, medication and therapy tables.
    pub therapy_chunk_size: usize,
}

impl Default for ExtractionOptions {
    fn default() -> Self {
        Self {
            window_hours: 30,
            window_upper_bound: UpperBound::Inclusive,
            event_chunk_size: 500_000,
            therapy_chunk_size: 100_000,
        }
    }
}

impl ExtractionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window_hours(mut self, hours: i64) -> Self {
        self.window_hours = hours;
        self
    }

    pub fn with_upper_bound(mut self, upper: UpperBound) -> Self {
        self.window_upper_bound = upper;
        self
    }

    pub fn with_event_chunk_size(mut self, size: usize) -> Self {
        self.event_chunk_size = size.max(1);
        self
    }

    pub fn with_therapy_chunk_size(mut self, size: usize) -> Self {
        self.therapy_chunk_size = size.max(1);
        self
    }
}
