//! # Request Reference Numbers
//!
//! Layout (25 characters):
//!
//! ```text
//! SBI  DL  26  292  134501123  048213
//! |    |   |   |    |          +-- 6 random digits
//! |    |   |   |    +------------- HHMMSS + milliseconds
//! |    |   |   +------------------ day of year, 001..=366
//! |    |   +---------------------- 2-digit year
//! |    +-------------------------- 2-character source code
//! +------------------------------- fixed prefix
//! ```
//!
//! Uniqueness across instants comes from the time component; the random
//! suffix separates requests issued within the same millisecond.

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Timelike, Utc};
use dlc_core::ValidationError;
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};

/// Fixed reference prefix.
pub const REFERENCE_PREFIX: &str = "SBI";

/// Total reference length.
pub const REFERENCE_LEN: usize = 25;

const SOURCE_LEN: usize = 2;

/// Correlates a request with its response and with partner-side logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ReferenceNumber(String);

impl ReferenceNumber {
    /// Generate a reference for the current time at `offset`.
    pub fn generate(source: &str, offset: FixedOffset) -> Result<Self, ValidationError> {
        Self::generate_at(source, &Utc::now().with_timezone(&offset), &mut rand::thread_rng())
    }

    /// Generate a reference for a given instant and random source.
    pub fn generate_at<Tz, R>(
        source: &str,
        at: &DateTime<Tz>,
        rng: &mut R,
    ) -> Result<Self, ValidationError>
    where
        Tz: TimeZone,
        R: Rng + ?Sized,
    {
        validate_source(source)?;
        let millis = at.timestamp_subsec_millis().min(999);
        let suffix: u32 = rng.gen_range(0..1_000_000);
        Ok(Self(format!(
            "{REFERENCE_PREFIX}{source}{:02}{:03}{:02}{:02}{:02}{millis:03}{suffix:06}",
            at.year().rem_euclid(100),
            at.ordinal(),
            at.hour(),
            at.minute(),
            at.second(),
        )))
    }

    /// Parse and validate a reference received from the partner.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.len() != REFERENCE_LEN || !raw.is_ascii() {
            return Err(invalid(format!(
                "expected {REFERENCE_LEN} ASCII characters, got {:?}",
                raw
            )));
        }
        let Some(rest) = raw.strip_prefix(REFERENCE_PREFIX) else {
            return Err(invalid(format!("missing {REFERENCE_PREFIX} prefix")));
        };
        let (source, digits) = rest.split_at(SOURCE_LEN);
        validate_source(source)?;
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("time and suffix must be digits"));
        }

        let field = |range: std::ops::Range<usize>| -> u32 {
            digits[range].parse().unwrap_or(u32::MAX)
        };
        let day = field(2..5);
        let (hour, minute, second) = (field(5..7), field(7..9), field(9..11));
        if !(1..=366).contains(&day) {
            return Err(invalid(format!("day of year {day} out of range")));
        }
        if hour > 23 || minute > 59 || second > 59 {
            return Err(invalid("time of day out of range"));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The two-character source code.
    pub fn source(&self) -> &str {
        &self.0[REFERENCE_PREFIX.len()..REFERENCE_PREFIX.len() + SOURCE_LEN]
    }
}

fn validate_source(source: &str) -> Result<(), ValidationError> {
    let ok = source.len() == SOURCE_LEN
        && source
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(ValidationError::Invalid {
            field: "reference_source",
            reason: format!("expected two uppercase alphanumerics, got {source:?}"),
        })
    }
}

fn invalid(reason: impl Into<String>) -> ValidationError {
    ValidationError::Invalid {
        field: "request_reference_number",
        reason: reason.into(),
    }
}

impl<'de> Deserialize<'de> for ReferenceNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for ReferenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
