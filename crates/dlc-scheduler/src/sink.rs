//! Report sinks.

use std::path::{Path, PathBuf};

use dlc_core::{ReportSink, RunReport, RunStatus, StoreError};

/// Logs a summary line per report and one line per failed region.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReportSink;

impl ReportSink for TracingReportSink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn publish(&self, report: &RunReport) -> Result<(), StoreError> {
        let duration_ms = report.duration().map(|d| d.num_milliseconds());
        match report.status {
            RunStatus::Success => tracing::info!(
                run_id = %report.run_id,
                status = %report.status,
                successful = report.successful_states,
                records = report.total_records,
                ?duration_ms,
                "run finished"
            ),
            _ => tracing::warn!(
                run_id = %report.run_id,
                status = %report.status,
                successful = report.successful_states,
                failed = report.failed_states,
                records = report.total_records,
                fatal = report.fatal_error.as_deref(),
                ?duration_ms,
                "run finished with failures"
            ),
        }
        for error in &report.errors {
            tracing::warn!(
                run_id = %report.run_id,
                region = %error.region,
                kind = %error.kind,
                attempts = error.attempts,
                "region failed: {}",
                error.message
            );
        }
        Ok(())
    }
}

/// Writes each report as pretty JSON under a directory.
///
/// File name: `run-<started_at>-<run uuid>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileReportSink {
    dir: PathBuf,
}

impl JsonFileReportSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, report: &RunReport) -> PathBuf {
        self.dir.join(format!(
            "run-{}-{}.json",
            report.started_at.format("%Y%m%dT%H%M%SZ"),
            report.run_id.as_uuid()
        ))
    }
}

impl ReportSink for JsonFileReportSink {
    fn name(&self) -> &str {
        "json-file"
    }

    fn publish(&self, report: &RunReport) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(report);
        let json = serde_json::to_vec_pretty(report)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        tracing::debug!(path = %path.display(), "run report written");
        Ok(())
    }
}
