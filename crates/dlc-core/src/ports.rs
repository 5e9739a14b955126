//! # Outbound Ports
//!
//! Where fetched data and finished reports go. The relational store and the
//! durable report log are owned by other services; this crate only names
//! the operations the sync needs from them.
//!
//! Implementations must be `Send + Sync` so the scheduler can share them
//! across region tasks behind an `Arc`.

use serde_json::Value;
use thiserror::Error;

use crate::identity::{BatchId, RegionCode};
use crate::report::RunReport;
use crate::temporal::SyncDate;

/// Failure writing to an external collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing store rejected or failed the write.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The data could not be encoded for storage.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Persistence for fetched batches and records.
pub trait RecordStore: Send + Sync {
    /// Record that a batch id was issued for a region/date.
    fn save_batch_result(
        &self,
        region: &RegionCode,
        date: SyncDate,
        batch_id: &BatchId,
        meta: &Value,
    ) -> Result<(), StoreError>;

    /// Store the records fetched for a batch.
    fn save_records(
        &self,
        region: &RegionCode,
        date: SyncDate,
        batch_id: &BatchId,
        records: &[Value],
    ) -> Result<(), StoreError>;
}

/// Durable destination for finished run reports.
pub trait ReportSink: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Persist a finished report.
    fn publish(&self, report: &RunReport) -> Result<(), StoreError>;
}
