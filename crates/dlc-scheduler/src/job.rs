//! # Single-Flight Job State
//!
//! At most one full run is active per [`JobState`]. `try_start` and
//! `finish` each take the mutex once; the lock is never held across an
//! `.await`.
//!
//! A [`RunGuard`] clears the active run when dropped, so a panicking or
//! cancelled run does not wedge the scheduler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dlc_core::{RunId, RunReport, SyncDate};
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::SchedulerError;

/// The run currently holding the single-flight slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRun {
    pub run_id: RunId,
    pub date: SyncDate,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Slots {
    active: Option<ActiveRun>,
    last_report: Option<RunReport>,
}

/// Job state owned by one scheduler instance.
#[derive(Debug, Default)]
pub struct JobState {
    slots: Mutex<Slots>,
}

impl JobState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim the slot for a new run, or report the run holding it.
    pub fn try_start(self: &Arc<Self>, date: SyncDate) -> Result<RunGuard, SchedulerError> {
        let mut slots = self.slots.lock();
        if let Some(active) = &slots.active {
            return Err(SchedulerError::AlreadyRunning {
                run_id: active.run_id,
                started_at: active.started_at,
            });
        }
        let run = ActiveRun {
            run_id: RunId::new(),
            date,
            started_at: Utc::now(),
        };
        slots.active = Some(run.clone());
        Ok(RunGuard {
            state: Arc::clone(self),
            run,
            finished: false,
        })
    }

    pub fn active(&self) -> Option<ActiveRun> {
        self.slots.lock().active.clone()
    }

    pub fn last_report(&self) -> Option<RunReport> {
        self.slots.lock().last_report.clone()
    }

    fn release(&self, run_id: RunId, report: Option<RunReport>) {
        let mut slots = self.slots.lock();
        if slots.active.as_ref().map(|a| a.run_id) == Some(run_id) {
            slots.active = None;
        }
        if report.is_some() {
            slots.last_report = report;
        }
    }
}

/// Proof of holding the single-flight slot.
#[derive(Debug)]
pub struct RunGuard {
    state: Arc<JobState>,
    run: ActiveRun,
    finished: bool,
}

impl RunGuard {
    pub fn run(&self) -> &ActiveRun {
        &self.run
    }

    /// Release the slot and record the finished report.
    pub fn finish(mut self, report: RunReport) {
        self.finished = true;
        self.state.release(self.run.run_id, Some(report));
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(run_id = %self.run.run_id, "run ended without a report");
            self.state.release(self.run.run_id, None);
        }
    }
}
