//! CSV ingestion for ICU feature extraction.
//!
//! - **events**: bounded-size batches of event records from one source table
//! - **cohort**: the cohort table and ICU-stay based cohort selection
//! - **dictionary**: item ids resolved from dictionary labels
//! - **demographics**: age, gender and ethnicity per cohort patient
//! - **scores**: previously computed organ-dysfunction scores

pub mod cohort;
pub mod csv_util;
pub mod demographics;
pub mod dictionary;
pub mod error;
pub mod events;
pub mod scores;
pub mod selection;
pub mod timestamp;

pub use cohort::{ADMISSION_COLUMNS, load_cohort};
pub use demographics::{Demographics, PatientDemographics, load_demographics};
pub use dictionary::resolve_item_labels;
pub use error::IngestError;
pub use events::{EventBatches, StreamingOptions, stream_events};
pub use scores::{ScoreRange, ScoreTable, load_scores};
pub use selection::{
    ADULT_ICUS, IcuStay, SelectionOptions, SelectionSummary, select_first_stays, stays_to_cohort,
};
pub use timestamp::parse_timestamp;
