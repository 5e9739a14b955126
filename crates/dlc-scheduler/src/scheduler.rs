//! # Sync Scheduler
//!
//! Owns the job state, the fetcher, and the report sinks. Runs are started
//! by [`SyncScheduler::trigger`] (manual) or by the cron loop in
//! [`SyncScheduler::run_forever`]. Both go through the same single-flight
//! slot, so an overlapping fire is skipped rather than queued.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use dlc_core::{RecordStore, ReportSink, RunReport, SyncDate};
use serde::Serialize;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::fetcher::{Fetcher, RegionWorker};
use crate::job::{ActiveRun, JobState};
use crate::plan::RunPlan;
use crate::sink::{JsonFileReportSink, TracingReportSink};

/// Snapshot returned by [`SyncScheduler::status`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulerStatus {
    pub active: Option<ActiveRun>,
    pub last_report: Option<RunReport>,
    pub next_fire: Option<DateTime<FixedOffset>>,
}

pub struct SyncScheduler<W> {
    config: SchedulerConfig,
    fetcher: Fetcher<W>,
    sinks: Vec<Arc<dyn ReportSink>>,
    job: Arc<JobState>,
}

impl<W: RegionWorker> SyncScheduler<W> {
    /// Build a scheduler. Reports go to the tracing sink, plus a JSON file
    /// sink when `report_dir` is configured.
    pub fn new(config: SchedulerConfig, worker: W, store: Arc<dyn RecordStore>) -> Self {
        let mut sinks: Vec<Arc<dyn ReportSink>> = vec![Arc::new(TracingReportSink)];
        if let Some(dir) = &config.report_dir {
            sinks.push(Arc::new(JsonFileReportSink::new(dir.clone())));
        }
        let fetcher = Fetcher::new(Arc::new(worker), store, config.retry, config.batch_pause);
        Self {
            config,
            fetcher,
            sinks,
            job: JobState::new(),
        }
    }

    /// Replace the report sinks.
    pub fn with_sinks(mut self, sinks: Vec<Arc<dyn ReportSink>>) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Today minus the configured lag, in the configured offset.
    pub fn target_date(&self) -> SyncDate {
        SyncDate::days_ago(self.config.date_lag_days, self.config.utc_offset)
    }

    /// Run once now for `date`, or for [`target_date`](Self::target_date).
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if another run holds the slot. Every other failure
    /// is reported inside the returned [`RunReport`].
    pub async fn trigger(&self, date: Option<SyncDate>) -> Result<RunReport, SchedulerError> {
        let date = date.unwrap_or_else(|| self.target_date());
        let guard = self.job.try_start(date)?;
        let run_id = guard.run().run_id;
        tracing::info!(%run_id, %date, "run started");

        let mut report = RunReport::start(run_id);
        let plan = RunPlan::build(
            &self.config.regions,
            &self.config.priority_regions,
            self.config.batch_size,
        );
        let report = match plan {
            Ok(plan) => {
                tracing::info!(
                    %run_id,
                    regions = plan.region_count(),
                    batches = plan.batches().len(),
                    "run planned"
                );
                self.fetcher.run(&plan, date, &mut report).await;
                report.finish()
            }
            Err(e) => {
                tracing::error!(%run_id, "run cannot start: {e}");
                report.abort(e.to_string())
            }
        };

        self.publish(&report);
        guard.finish(report.clone());
        Ok(report)
    }

    /// Current slot holder, last finished report, and next cron fire.
    pub fn status(&self) -> SchedulerStatus {
        let now = Utc::now().with_timezone(&self.config.utc_offset);
        SchedulerStatus {
            active: self.job.active(),
            last_report: self.job.last_report(),
            next_fire: self
                .config
                .schedule()
                .ok()
                .and_then(|s| s.after(&now).next()),
        }
    }

    fn publish(&self, report: &RunReport) {
        for sink in &self.sinks {
            if let Err(e) = sink.publish(report) {
                tracing::error!(sink = sink.name(), run_id = %report.run_id, "report sink failed: {e}");
            }
        }
    }
}

impl<W: RegionWorker> SyncScheduler<W> {
    /// Fire a run at every cron tick until the schedule runs out.
    ///
    /// Each run is spawned so a long run never delays the next tick; a tick
    /// that lands while a run is active is logged and skipped.
    pub async fn run_forever(self: Arc<Self>) -> Result<(), SchedulerError> {
        let schedule = self.config.schedule()?;
        tracing::info!(cron = %self.config.cron, "scheduler started");
        loop {
            let now = Utc::now().with_timezone(&self.config.utc_offset);
            let Some(next) = schedule.after(&now).next() else {
                return Err(SchedulerError::ScheduleExhausted);
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tracing::debug!(next = %next, ?wait, "sleeping until next fire");
            tokio::time::sleep(wait).await;

            if let Some(active) = self.job.active() {
                tracing::warn!(run_id = %active.run_id, "previous run still active, skipping fire");
                continue;
            }
            let scheduler = Arc::clone(&self);
            tokio::spawn(async move {
                match scheduler.trigger(None).await {
                    Ok(report) => tracing::info!(run_id = %report.run_id, status = %report.status, "scheduled run done"),
                    Err(e) => tracing::warn!("scheduled run skipped: {e}"),
                }
            });
        }
    }
}
