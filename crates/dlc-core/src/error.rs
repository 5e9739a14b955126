//! # Validation Errors
//!
//! Raised when a domain value fails its constructor checks. Validation
//! failures are never retried: the same input fails the same way.

use thiserror::Error;

/// A domain value was rejected at construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field was empty or absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field was present but malformed.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl ValidationError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
