//! Stable output column layout.

use icu_model::ReductionKind;
use icu_standards::Vocabulary;

use crate::score::SCORE_COLUMNS;
use crate::table::ColumnSpec;

pub const AGE: &str = "age";
pub const GENDER: &str = "gender";
pub const ETHNICITY: &str = "ethnicity";
pub const SCORE_FILE_MIN: &str = "SOFA_score_min";
pub const SCORE_FILE_MAX: &str = "SOFA_score_max";

/// Every output column after `subject_id`: demographics, feature columns in
/// vocabulary order, exposure summaries, the external score range and the
/// computed sub-scores. The layout depends only on the vocabulary, never on
/// the data.
pub fn output_layout(vocabulary: &Vocabulary) -> Vec<ColumnSpec> {
    let mut layout = vec![
        ColumnSpec::numeric(AGE),
        ColumnSpec::text(GENDER),
        ColumnSpec::text(ETHNICITY),
    ];
    for feature in vocabulary.features() {
        match feature.reduction {
            ReductionKind::MinMax => {
                layout.push(ColumnSpec::numeric(feature.min_column()));
                layout.push(ColumnSpec::numeric(feature.max_column()));
            }
            ReductionKind::Presence => layout.push(ColumnSpec::flag(&feature.name)),
            ReductionKind::MaxDose => layout.push(ColumnSpec::numeric(&feature.name)),
        }
    }
    for summary in vocabulary.summaries() {
        layout.push(ColumnSpec::text_set(&summary.names_column));
        layout.push(ColumnSpec::text_set(&summary.sources_column));
    }
    layout.push(ColumnSpec::numeric(SCORE_FILE_MIN));
    layout.push(ColumnSpec::numeric(SCORE_FILE_MAX));
    layout.extend(SCORE_COLUMNS.iter().map(|name| ColumnSpec::numeric(*name)));
    layout
}
