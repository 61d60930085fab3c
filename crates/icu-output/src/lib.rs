//! Output of the feature table and the selected cohort.
//!
//! Tables are converted to Polars `DataFrame`s and written as CSV with a
//! header row; missing values are written as empty cells.

mod frame;
mod writer;

pub use frame::{COHORT_COLUMNS, SUBJECT_ID, cohort_frame, feature_frame};
pub use writer::{
    emergency_path, write_cohort, write_emergency_save, write_feature_table, write_frame_csv,
};
