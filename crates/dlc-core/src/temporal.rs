//! # Sync Dates
//!
//! `SyncDate` is the calendar day a region fetch is keyed on. It travels on
//! the wire as `YYYY-MM-DD` and is always a plain date: the partner gateway
//! has no notion of time zones for this field, so the scheduler resolves
//! "which day" in its configured offset before constructing one.

use chrono::{Datelike, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

const WIRE_FORMAT: &str = "%Y-%m-%d";

/// Calendar date for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncDate(NaiveDate);

impl SyncDate {
    /// Wrap a `NaiveDate`.
    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Parse from `YYYY-MM-DD`.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        NaiveDate::parse_from_str(raw.trim(), WIRE_FORMAT)
            .map(Self)
            .map_err(|e| ValidationError::Invalid {
                field: "date",
                reason: format!("expected YYYY-MM-DD, got {raw:?}: {e}"),
            })
    }

    /// The date `lag_days` before today, as observed at the given UTC offset.
    pub fn days_ago(lag_days: u32, offset: FixedOffset) -> Self {
        let today = Utc::now().with_timezone(&offset).date_naive();
        Self(today - Duration::days(i64::from(lag_days)))
    }

    /// Access the inner date.
    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }

    /// Render in wire format.
    pub fn to_wire(&self) -> String {
        self.0.format(WIRE_FORMAT).to_string()
    }

    /// Day of year, 1-based.
    pub fn ordinal(&self) -> u32 {
        self.0.ordinal()
    }
}

impl std::fmt::Display for SyncDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_wire())
    }
}

impl std::str::FromStr for SyncDate {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for SyncDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_wire())
    }
}

impl<'de> Deserialize<'de> for SyncDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
