//! Scheduler configuration, loaded from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::FixedOffset;
use cron::Schedule;
use dlc_core::RegionCode;
use dlc_gateway_client::{
    default_utc_offset, env_flag, env_parsed, env_utc_offset, ConfigError, RetryPolicy,
};

/// Default cadence: 01:30:00 every day.
pub const DEFAULT_CRON: &str = "0 30 1 * * *";

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Every region to sync.
    pub regions: Vec<RegionCode>,
    /// Regions dispatched first, in this order.
    pub priority_regions: Vec<RegionCode>,
    /// Regions processed concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_pause: Duration,
    pub retry: RetryPolicy,
    /// Six-field cron expression, seconds first.
    pub cron: String,
    /// Offset used for the cron clock and for "today".
    pub utc_offset: FixedOffset,
    /// Target date is today minus this many days.
    pub date_lag_days: u32,
    /// Directory for JSON run reports, if any.
    pub report_dir: Option<PathBuf>,
}

impl SchedulerConfig {
    /// Defaults for the given regions.
    pub fn new(regions: Vec<RegionCode>) -> Self {
        Self {
            regions,
            priority_regions: Vec::new(),
            batch_size: 5,
            batch_pause: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            cron: DEFAULT_CRON.to_string(),
            utc_offset: default_utc_offset(),
            date_lag_days: 1,
            report_dir: None,
        }
    }

    /// Load from environment variables.
    ///
    /// - `DLC_REGIONS`, `DLC_PRIORITY_REGIONS`: comma-separated region codes
    /// - `DLC_BATCH_SIZE` (5), `DLC_BATCH_PAUSE_SECS` (10)
    /// - `DLC_MAX_ATTEMPTS` (3), `DLC_RETRY_BASE_DELAY_MS` (2000), `DLC_RETRY_EXPONENTIAL` (true)
    /// - `DLC_CRON` (`0 30 1 * * *`, seconds first)
    /// - `DLC_UTC_OFFSET_MINUTES` (330), `DLC_DATE_LAG_DAYS` (1)
    /// - `DLC_REPORT_DIR` (unset)
    pub fn from_env() -> Result<Self, ConfigError> {
        let regions = region_list("DLC_REGIONS")?;
        let priority_regions = region_list("DLC_PRIORITY_REGIONS")?;

        let cron = std::env::var("DLC_CRON")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CRON.to_string());
        parse_cron(&cron)?;

        let utc_offset = env_utc_offset("DLC_UTC_OFFSET_MINUTES")?;

        Ok(Self {
            regions,
            priority_regions,
            batch_size: env_parsed("DLC_BATCH_SIZE", 5)?,
            batch_pause: Duration::from_secs(env_parsed("DLC_BATCH_PAUSE_SECS", 10)?),
            retry: RetryPolicy {
                max_attempts: env_parsed("DLC_MAX_ATTEMPTS", 3)?,
                base_delay: Duration::from_millis(env_parsed("DLC_RETRY_BASE_DELAY_MS", 2000)?),
                exponential: env_flag("DLC_RETRY_EXPONENTIAL", true)?,
            },
            cron,
            utc_offset,
            date_lag_days: env_parsed("DLC_DATE_LAG_DAYS", 1)?,
            report_dir: std::env::var("DLC_REPORT_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    /// Parsed cron schedule.
    pub fn schedule(&self) -> Result<Schedule, ConfigError> {
        parse_cron(&self.cron)
    }
}

fn parse_cron(expression: &str) -> Result<Schedule, ConfigError> {
    Schedule::from_str(expression.trim()).map_err(|e| ConfigError::invalid("DLC_CRON", e.to_string()))
}

fn region_list(var: &'static str) -> Result<Vec<RegionCode>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => RegionCode::parse_list(&raw).map_err(|e| ConfigError::invalid(var, e.to_string())),
        Err(_) => Ok(Vec::new()),
    }
}
