//! # dlc-scheduler: Region Fan-Out
//!
//! Drives the two-phase workflow across every configured region:
//!
//! 1. Claim the single-flight slot ([`job`]).
//! 2. Order regions priority-first and cut them into batches ([`plan`]).
//! 3. Run each batch concurrently with per-region retry, pausing between
//!    batches ([`fetcher`]).
//! 4. Persist fetched records ([`store`]) and publish the run report
//!    ([`sink`]).
//!
//! [`SyncScheduler`] ties these together for manual triggers and the cron
//! loop.

pub mod config;
pub mod error;
pub mod fetcher;
pub mod job;
pub mod plan;
pub mod scheduler;
pub mod sink;
pub mod store;

pub use config::SchedulerConfig;
pub use error::SchedulerError;
pub use fetcher::{Fetcher, RegionWorker};
pub use job::{ActiveRun, JobState, RunGuard};
pub use plan::RunPlan;
pub use scheduler::{SchedulerStatus, SyncScheduler};
pub use sink::{JsonFileReportSink, TracingReportSink};
pub use store::{InMemoryRecordStore, StoredBatch};
