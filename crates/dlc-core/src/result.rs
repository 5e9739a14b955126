//! # Transaction Results
//!
//! The outcome of one two-phase workflow execution for one region/date,
//! after retries. Produced by the gateway workflow, consumed by the
//! scheduler and merged into a [`RunReport`](crate::RunReport).

use serde::{Deserialize, Serialize};

use crate::identity::{BatchId, RegionCode};
use crate::temporal::SyncDate;

/// Error classes, shared between the workflow and the run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A required request field was missing or malformed.
    Validation,
    /// Key unwrap, tag mismatch or signature mismatch.
    CryptoFailure,
    /// Record payload exceeded the partner's size ceiling.
    PayloadTooLarge,
    /// No response, or HTTP 5xx.
    NetworkOrGateway,
    /// A new run was requested while one was active.
    AlreadyRunning,
    /// Anything else.
    Technical,
}

impl ErrorKind {
    /// Whether an attempt failing with this kind should be retried.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::CryptoFailure | Self::NetworkOrGateway)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Validation => "validation",
            Self::CryptoFailure => "crypto_failure",
            Self::PayloadTooLarge => "payload_too_large",
            Self::NetworkOrGateway => "network_or_gateway",
            Self::AlreadyRunning => "already_running",
            Self::Technical => "technical",
        };
        f.write_str(s)
    }
}

/// How a region/date transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionOutcome {
    /// Batch id obtained and records fetched.
    Completed,
    /// Partner reported zero batches or zero records. Not an error.
    NoDataFound,
    /// Record payload exceeded the size ceiling.
    PayloadTooLarge,
    /// Failed after exhausting retries, or with a non-retryable error.
    Failed,
}

/// Result of one region/date transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    pub region: RegionCode,
    pub date: SyncDate,
    pub success: bool,
    pub outcome: TransactionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<BatchId>,
    pub record_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub attempts: u32,
}

impl TransactionResult {
    /// Records fetched successfully.
    pub fn completed(
        region: RegionCode,
        date: SyncDate,
        batch_id: BatchId,
        record_count: usize,
        attempts: u32,
    ) -> Self {
        Self {
            region,
            date,
            success: true,
            outcome: TransactionOutcome::Completed,
            batch_id: Some(batch_id),
            record_count,
            error: None,
            error_kind: None,
            attempts,
        }
    }

    /// Nothing to fetch for this region/date.
    pub fn no_data(
        region: RegionCode,
        date: SyncDate,
        batch_id: Option<BatchId>,
        attempts: u32,
    ) -> Self {
        Self {
            region,
            date,
            success: true,
            outcome: TransactionOutcome::NoDataFound,
            batch_id,
            record_count: 0,
            error: None,
            error_kind: None,
            attempts,
        }
    }

    /// The transaction failed. `PayloadTooLarge` errors get their own outcome.
    pub fn failed(
        region: RegionCode,
        date: SyncDate,
        batch_id: Option<BatchId>,
        kind: ErrorKind,
        error: impl Into<String>,
        attempts: u32,
    ) -> Self {
        let outcome = if kind == ErrorKind::PayloadTooLarge {
            TransactionOutcome::PayloadTooLarge
        } else {
            TransactionOutcome::Failed
        };
        Self {
            region,
            date,
            success: false,
            outcome,
            batch_id,
            record_count: 0,
            error: Some(error.into()),
            error_kind: Some(kind),
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> RegionCode {
        RegionCode::new("ALPHA").unwrap()
    }

    fn date() -> SyncDate {
        SyncDate::parse("2025-01-15").unwrap()
    }

    #[test]
    fn retryable_kinds() {
        assert!(ErrorKind::CryptoFailure.is_retryable());
        assert!(ErrorKind::NetworkOrGateway.is_retryable());
        assert!(!ErrorKind::Validation.is_retryable());
        assert!(!ErrorKind::PayloadTooLarge.is_retryable());
        assert!(!ErrorKind::AlreadyRunning.is_retryable());
        assert!(!ErrorKind::Technical.is_retryable());
    }

    #[test]
    fn payload_too_large_gets_distinct_outcome() {
        let result = TransactionResult::failed(
            region(),
            date(),
            Some(BatchId::new("7").unwrap()),
            ErrorKind::PayloadTooLarge,
            "too big",
            1,
        );
        assert!(!result.success);
        assert_eq!(result.outcome, TransactionOutcome::PayloadTooLarge);
        assert_eq!(result.record_count, 0);
    }

    #[test]
    fn no_data_is_a_success() {
        let result = TransactionResult::no_data(region(), date(), None, 1);
        assert!(result.success);
        assert_eq!(result.outcome, TransactionOutcome::NoDataFound);
    }

    #[test]
    fn serializes_without_empty_optionals() {
        let result = TransactionResult::completed(
            region(),
            date(),
            BatchId::new("7").unwrap(),
            3,
            1,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["batch_id"], "7");
        assert_eq!(json["outcome"], "completed");
        assert!(json.get("error").is_none());
    }
}
