//! # Run Reports
//!
//! Aggregate of one full run across all configured regions. Created at run
//! start, fed per-batch results in dispatch order, finalized at run end.
//! Only the shape lives here; durable storage is a [`ReportSink`](crate::ReportSink).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::{RegionCode, RunId};
use crate::result::{ErrorKind, TransactionResult};

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Still in progress.
    Running,
    /// Zero failed regions.
    Success,
    /// At least one failed region.
    PartialSuccess,
    /// Fatal error before any region was processed.
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::PartialSuccess => "partial_success",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// One failed region, as listed in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionError {
    pub region: RegionCode,
    pub kind: ErrorKind,
    pub message: String,
    pub attempts: u32,
}

/// Aggregate of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub results: Vec<TransactionResult>,
    pub successful_states: usize,
    pub failed_states: usize,
    pub total_records: usize,
    pub errors: Vec<RegionError>,
    /// Set when the run failed before any region was processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
}

impl RunReport {
    /// Open a report for a run starting now.
    pub fn start(run_id: RunId) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            status: RunStatus::Running,
            results: Vec::new(),
            successful_states: 0,
            failed_states: 0,
            total_records: 0,
            errors: Vec::new(),
            fatal_error: None,
        }
    }

    /// Merge the results of one settled batch.
    pub fn record_batch(&mut self, batch: impl IntoIterator<Item = TransactionResult>) {
        for result in batch {
            if result.success {
                self.successful_states += 1;
                self.total_records += result.record_count;
            } else {
                self.failed_states += 1;
                self.errors.push(RegionError {
                    region: result.region.clone(),
                    kind: result.error_kind.unwrap_or(ErrorKind::Technical),
                    message: result.error.clone().unwrap_or_default(),
                    attempts: result.attempts,
                });
            }
            self.results.push(result);
        }
    }

    /// Close the report. Status is `success` only if no region failed.
    pub fn finish(mut self) -> Self {
        self.finished_at = Some(Utc::now());
        self.status = if self.fatal_error.is_some() {
            RunStatus::Failed
        } else if self.failed_states == 0 {
            RunStatus::Success
        } else {
            RunStatus::PartialSuccess
        };
        self
    }

    /// Close the report as failed before any region ran.
    pub fn abort(mut self, reason: impl Into<String>) -> Self {
        self.fatal_error = Some(reason.into());
        self.finish()
    }

    /// Wall-clock duration, once finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::BatchId;
    use crate::temporal::SyncDate;

    fn date() -> SyncDate {
        SyncDate::parse("2025-01-15").unwrap()
    }

    fn ok(region: &str, records: usize) -> TransactionResult {
        TransactionResult::completed(
            RegionCode::new(region).unwrap(),
            date(),
            BatchId::new("1").unwrap(),
            records,
            1,
        )
    }

    fn failed(region: &str) -> TransactionResult {
        TransactionResult::failed(
            RegionCode::new(region).unwrap(),
            date(),
            None,
            ErrorKind::NetworkOrGateway,
            "gateway returned 503",
            3,
        )
    }

    #[test]
    fn all_successful_regions_make_a_successful_run() {
        let mut report = RunReport::start(RunId::new());
        report.record_batch(vec![ok("A", 2), ok("B", 3)]);
        let report = report.finish();
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(report.successful_states, 2);
        assert_eq!(report.total_records, 5);
        assert!(report.finished_at.is_some());
    }

    #[test]
    fn any_failed_region_makes_a_partial_success() {
        let mut report = RunReport::start(RunId::new());
        report.record_batch(vec![ok("A", 2), failed("B")]);
        report.record_batch(vec![ok("C", 1)]);
        let report = report.finish();
        assert_eq!(report.status, RunStatus::PartialSuccess);
        assert_eq!(report.failed_states, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].region.as_str(), "B");
        assert_eq!(report.errors[0].attempts, 3);
        let order: Vec<&str> = report.results.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn abort_marks_the_run_failed() {
        let report = RunReport::start(RunId::new()).abort("no regions configured");
        assert_eq!(report.status, RunStatus::Failed);
        assert_eq!(report.fatal_error.as_deref(), Some("no regions configured"));
    }

    #[test]
    fn serializes_with_camel_case_counts() {
        let report = RunReport::start(RunId::new()).finish();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["successfulStates"], 0);
        assert_eq!(json["status"], "success");
    }
}
