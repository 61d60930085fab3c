#![deny(unsafe_code)]

use std::path::PathBuf;

use icu_model::ModelError;

#[derive(Debug, thiserror::Error)]
pub enum StandardsError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML vocabulary {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid feature family: {0}")]
    InvalidFamily(#[from] ModelError),

    #[error("feature {feature} is reduced as {first:?} in one family and {second:?} in another")]
    ConflictingReduction {
        feature: String,
        first: icu_model::ReductionKind,
        second: icu_model::ReductionKind,
    },

    #[error("feature {feature} in family {family} has unresolved dictionary labels")]
    UnresolvedLabels { family: String, feature: String },

    #[error("vocabulary defines no feature families")]
    Empty,
}

impl StandardsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
