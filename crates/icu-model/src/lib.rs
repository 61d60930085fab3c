pub mod cohort;
pub mod error;
pub mod event;
pub mod feature;
pub mod ids;
pub mod options;
pub mod window;

pub use cohort::{Cohort, Patient};
pub use error::{ModelError, Result};
pub use event::{EventCode, EventRecord};
pub use feature::{
    CodeKind, CodeSet, ExposureSummary, FeatureDefinition, FeatureFamily, ReductionKind,
    SourceTable, ValuePolicy, WindowPolicy, normalize_hierarchical_code,
};
pub use ids::SubjectId;
pub use options::{ExtractionOptions, UpperBound};
pub use window::ObservationWindow;
