//! Pipeline configuration file.
//!
//! Every key is optional; command line flags take precedence over the file
//! and built-in defaults fill the rest. Relative paths in the file are
//! resolved against the file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use icu_ingest::SelectionOptions;
use icu_model::ExtractionOptions;
use serde::{Deserialize, Serialize};

pub const DEFAULT_COHORT: &str = "patients.csv";
pub const DEFAULT_OUTPUT: &str = "features.csv";
pub const DEFAULT_INTERMEDIATE: &str = "features_intermediate.csv";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root directory holding the `hosp/` and `icu/` source tables.
    pub data_root: Option<PathBuf>,
    pub cohort: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub intermediate: Option<PathBuf>,
    /// Previously computed organ-dysfunction scores.
    pub score_file: Option<PathBuf>,
    /// Feature vocabulary replacing or extending the built-in one.
    pub vocabulary: Option<PathBuf>,
    pub extraction: ExtractionOptions,
    pub selection: SelectionOptions,
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("parse pipeline configuration")
    }

    /// Reads `path` and resolves its relative paths against its directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("read configuration {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("invalid configuration {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));
        Ok(config.relative_to(base))
    }

    /// The default configuration when `path` is `None`.
    pub fn load_optional(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    fn relative_to(mut self, base: &Path) -> Self {
        for path in [
            &mut self.data_root,
            &mut self.cohort,
            &mut self.output,
            &mut self.intermediate,
            &mut self.score_file,
            &mut self.vocabulary,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
        self
    }

    pub fn cohort_path(&self) -> PathBuf {
        self.cohort
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_COHORT))
    }

    pub fn output_path(&self) -> PathBuf {
        self.output
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT))
    }

    pub fn intermediate_path(&self) -> PathBuf {
        self.intermediate
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INTERMEDIATE))
    }
}
