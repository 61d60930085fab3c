//! Features computed from other reduced features.

use anyhow::Result;

use crate::table::FeatureTable;

pub const GCS_TOTAL: &str = "GCS_Total";
pub const GCS_COMPONENTS: &[&str] = &["GCS_Eye", "GCS_Verbal", "GCS_Motor"];

/// Fills a missing `GCS_Total_{min,max}` with the sum of the three component
/// values of the same bound, when all three are present.
///
/// Returns the number of cells filled. Tables without the GCS columns are
/// left untouched.
pub fn complete_gcs_total(table: &mut FeatureTable) -> Result<usize> {
    let mut filled = 0usize;
    for suffix in ["min", "max"] {
        let total_column = format!("{GCS_TOTAL}_{suffix}");
        let component_columns: Vec<String> = GCS_COMPONENTS
            .iter()
            .map(|component| format!("{component}_{suffix}"))
            .collect();
        if !table.has_column(&total_column)
            || !component_columns.iter().all(|c| table.has_column(c))
        {
            continue;
        }
        let updates: Vec<_> = table
            .subjects()
            .iter()
            .filter(|subject_id| table.numeric(&total_column, **subject_id).is_none())
            .filter_map(|subject_id| {
                let parts: Option<Vec<f64>> = component_columns
                    .iter()
                    .map(|column| table.numeric(column, *subject_id))
                    .collect();
                parts.map(|parts| (*subject_id, parts.iter().sum::<f64>()))
            })
            .collect();
        for (subject_id, sum) in updates {
            table.set_numeric(&total_column, subject_id, Some(sum))?;
            filled += 1;
        }
    }
    Ok(filled)
}
