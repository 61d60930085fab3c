#![deny(unsafe_code)]

//! Code vocabulary for ICU feature extraction.
//!
//! - **mimic**: built-in feature families for the MIMIC-IV table layout
//! - **matcher**: item, prefix and drug-name matchers over one family
//! - **vocabulary**: the validated set of families, optionally loaded from TOML

pub mod error;
pub mod matcher;
pub mod mimic;
pub mod vocabulary;

pub use crate::error::StandardsError;
pub use crate::matcher::{DrugMatcher, FamilyMatcher, normalize_drug_name};
pub use crate::vocabulary::{Vocabulary, VocabularyFile};
