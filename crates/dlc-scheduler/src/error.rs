//! Scheduler errors.

use chrono::{DateTime, Utc};
use dlc_core::{ErrorKind, RunId};
use dlc_gateway_client::ConfigError;

/// Errors that stop a run from starting or the scheduler from continuing.
///
/// Region failures are not here: they are recorded in the run report.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A previous run has not finished.
    #[error("run {run_id} already in progress since {started_at}")]
    AlreadyRunning {
        run_id: RunId,
        started_at: DateTime<Utc>,
    },

    #[error("no regions configured")]
    NoRegions,

    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    /// The cron expression produces no further fire times.
    #[error("schedule has no upcoming fire time")]
    ScheduleExhausted,

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AlreadyRunning { .. } => ErrorKind::AlreadyRunning,
            Self::NoRegions | Self::ZeroBatchSize => ErrorKind::Validation,
            Self::ScheduleExhausted | Self::Config(_) => ErrorKind::Technical,
        }
    }
}
