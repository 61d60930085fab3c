use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid subject id: {0:?}")]
    InvalidSubjectId(String),
    #[error("invalid feature name: {0:?}")]
    InvalidFeatureName(String),
    #[error("feature {feature} in family {family} has no source codes")]
    EmptyCodeSet { family: String, feature: String },
    #[error("feature {feature} uses {found} codes but family {family} reads {expected} codes")]
    CodeKindMismatch {
        family: String,
        feature: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("code {code} is mapped to both {first} and {second} in family {family}")]
    DuplicateCode {
        family: String,
        code: String,
        first: String,
        second: String,
    },
    #[error("duplicate feature {feature} in family {family}")]
    DuplicateFeature { family: String, feature: String },
    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
