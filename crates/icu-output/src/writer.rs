use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use icu_core::FeatureTable;
use icu_ingest::IcuStay;
use polars::prelude::*;
use tracing::{info, info_span};

use crate::frame::{cohort_frame, feature_frame};

const EMERGENCY_SUFFIX: &str = "_emergency_save";

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output directory {}", parent.display()))?;
    }
    Ok(())
}

/// Writes `df` as CSV with a header row, replacing any existing file.
pub fn write_frame_csv(path: &Path, df: &mut DataFrame) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .finish(df)
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn write_feature_table(path: &Path, table: &FeatureTable) -> Result<()> {
    let _span = info_span!("write", path = %path.display()).entered();
    let mut df = feature_frame(table)?;
    write_frame_csv(path, &mut df)?;
    info!(rows = df.height(), columns = df.width(), "feature table written");
    Ok(())
}

/// `features.csv` becomes `features_emergency_save.csv` in the same
/// directory.
pub fn emergency_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "features".to_string());
    let extension = output
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());
    output.with_file_name(format!("{stem}{EMERGENCY_SUFFIX}.{extension}"))
}

/// Saves whatever has been merged so far next to `output`.
pub fn write_emergency_save(output: &Path, table: &FeatureTable) -> Result<PathBuf> {
    let path = emergency_path(output);
    write_feature_table(&path, table).context("emergency save failed")?;
    Ok(path)
}

pub fn write_cohort(path: &Path, stays: &[IcuStay]) -> Result<()> {
    let _span = info_span!("write", path = %path.display()).entered();
    let mut df = cohort_frame(stays)?;
    write_frame_csv(path, &mut df)?;
    info!(patients = df.height(), "cohort written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emergency_path_keeps_directory_and_extension() {
        assert_eq!(
            emergency_path(Path::new("out/features.csv")),
            PathBuf::from("out/features_emergency_save.csv")
        );
        assert_eq!(
            emergency_path(Path::new("features")),
            PathBuf::from("features_emergency_save.csv")
        );
    }
}
