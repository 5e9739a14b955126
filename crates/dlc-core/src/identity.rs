//! # Domain Identity Newtypes
//!
//! Region codes partition every fetch, batch identifiers are handles the
//! partner gateway issues per region/date, and run identifiers tag one full
//! scheduled execution. Keeping them as distinct types means a batch id can
//! never be passed where a region is expected.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Maximum accepted length of a region code.
const MAX_REGION_LEN: usize = 32;

/// Administrative region (e.g. a state) used as the fetch partition key.
///
/// Stored uppercase. Accepts ASCII letters, digits, `_` and `-`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RegionCode(String);

impl RegionCode {
    /// Validate and normalize a region code.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let code = raw.as_ref().trim();
        if code.is_empty() {
            return Err(ValidationError::MissingField("region"));
        }
        if code.len() > MAX_REGION_LEN {
            return Err(ValidationError::invalid(
                "region",
                format!("must be at most {MAX_REGION_LEN} characters, got {}", code.len()),
            ));
        }
        if let Some(bad) = code
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(ValidationError::invalid(
                "region",
                format!("unexpected character {bad:?} in {code:?}"),
            ));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    /// Borrow the normalized code.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a comma-separated list, skipping blank entries.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, ValidationError> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::new)
            .collect()
    }
}

impl<'de> Deserialize<'de> for RegionCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for RegionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Partner-issued handle for a retrievable group of records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    /// Wrap a batch identifier. Surrounding whitespace is dropped.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, ValidationError> {
        let id = raw.as_ref().trim();
        if id.is_empty() {
            return Err(ValidationError::MissingField("batch_id"));
        }
        Ok(Self(id.to_string()))
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for BatchId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for one scheduled or manually triggered run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new random run identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run:{}", self.0)
    }
}
