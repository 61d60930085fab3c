use chrono::NaiveDateTime;

use crate::SubjectId;

/// Source identifier of an event row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventCode {
    /// Numeric item id (lab, chart, input, output and procedure events).
    Item(i64),
    /// Diagnosis/procedure code or free-text drug name.
    Text(String),
}

/// One row read from a source event table. Never retained past its batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub subject_id: SubjectId,
    pub timestamp: Option<NaiveDateTime>,
    pub code: EventCode,
    pub value: Option<f64>,
}

impl EventRecord {
    pub fn item(
        subject_id: SubjectId,
        timestamp: Option<NaiveDateTime>,
        item_id: i64,
        value: Option<f64>,
    ) -> Self {
        Self {
            subject_id,
            timestamp,
            code: EventCode::Item(item_id),
            value,
        }
    }

    pub fn text(subject_id: SubjectId, code: impl Into<String>) -> Self {
        Self {
            subject_id,
            timestamp: None,
            code: EventCode::Text(code.into()),
            value: None,
        }
    }
}
