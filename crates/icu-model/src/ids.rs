#![deny(unsafe_code)]

use std::fmt;
use std::str::FromStr;

use crate::ModelError;

/// Stable patient identifier shared by every source table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct SubjectId(i64);

impl SubjectId {
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl FromStr for SubjectId {
    type Err = ModelError;

    /// Accepts plain integers and integral floats (`"10000032.0"`), which is
    /// how identifiers look after a round trip through some CSV writers.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return Ok(Self(id));
        }
        match trimmed.parse::<f64>() {
            Ok(float) if float.is_finite() && float.fract() == 0.0 => Ok(Self(float as i64)),
            _ => Err(ModelError::InvalidSubjectId(value.to_string())),
        }
    }
}

impl From<i64> for SubjectId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integral_forms() {
        assert_eq!("10000032".parse::<SubjectId>().unwrap(), SubjectId::new(10000032));
        assert_eq!(" 42 ".parse::<SubjectId>().unwrap(), SubjectId::new(42));
        assert_eq!("42.0".parse::<SubjectId>().unwrap(), SubjectId::new(42));
    }

    #[test]
    fn rejects_non_integral_forms() {
        assert!("42.5".parse::<SubjectId>().is_err());
        assert!("".parse::<SubjectId>().is_err());
        assert!("abc".parse::<SubjectId>().is_err());
    }
}
