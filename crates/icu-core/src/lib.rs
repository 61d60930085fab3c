//! Feature extraction engine for an ICU cohort.
//!
//! - **window**: per-patient observation windows
//! - **reduce**: chunked event reduction into per-patient aggregates
//! - **score**: organ-dysfunction (SOFA) sub-scores and total
//! - **table**: the per-patient feature table and its merge rules
//! - **derive**: features computed from other reduced features
//! - **pipeline**: runs every feature family against the source tables

pub mod derive;
pub mod layout;
pub mod pipeline;
pub mod reduce;
pub mod score;
pub mod table;
pub mod window;

pub use layout::output_layout;
pub use pipeline::{ExtractionPipeline, FamilyOutcome, FamilyReport, RunReport};
pub use reduce::{FamilyReducer, FamilyReduction, MinMax, ReduceStats, ReducedValues};
pub use table::{ColumnKind, ColumnSpec, FeatureTable};
pub use window::{WindowIndex, observation_window};
