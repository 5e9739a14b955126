//! # Region Fetcher
//!
//! Executes a [`RunPlan`] one batch at a time. Every region in a batch is a
//! separate task; the batch settles when all of them finish. Results are
//! merged in dispatch order, so the report is deterministic even though
//! completion order within a batch is not.
//!
//! Each region task retries its own workflow under the configured
//! [`RetryPolicy`]. A failed region is recorded and never aborts the run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dlc_core::{
    ErrorKind, RecordStore, RegionCode, RunReport, StoreError, SyncDate, TransactionResult,
};
use dlc_gateway_client::retry::retry_with_backoff;
use dlc_gateway_client::workflow::summarize;
use dlc_gateway_client::{
    Attempted, RetryPolicy, TransactionWorkflow, WorkflowError, WorkflowOutcome,
};
use serde_json::json;

use crate::plan::RunPlan;

/// One attempt at one region's two-phase transaction.
pub trait RegionWorker: Send + Sync + 'static {
    fn attempt(
        &self,
        region: &RegionCode,
        date: SyncDate,
    ) -> impl Future<Output = Result<WorkflowOutcome, WorkflowError>> + Send;
}

impl RegionWorker for TransactionWorkflow {
    async fn attempt(
        &self,
        region: &RegionCode,
        date: SyncDate,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.run(region, date).await
    }
}

/// Runs batches of regions against a worker and persists what they fetch.
pub struct Fetcher<W> {
    worker: Arc<W>,
    store: Arc<dyn RecordStore>,
    retry: RetryPolicy,
    batch_pause: Duration,
}

impl<W: RegionWorker> Fetcher<W> {
    pub fn new(
        worker: Arc<W>,
        store: Arc<dyn RecordStore>,
        retry: RetryPolicy,
        batch_pause: Duration,
    ) -> Self {
        Self {
            worker,
            store,
            retry,
            batch_pause,
        }
    }

    /// Process every batch of `plan`, merging results into `report`.
    pub async fn run(&self, plan: &RunPlan, date: SyncDate, report: &mut RunReport) {
        let total = plan.batches().len();
        for (index, batch) in plan.batches().iter().enumerate() {
            if index > 0 && !self.batch_pause.is_zero() {
                tracing::debug!(pause = ?self.batch_pause, "pausing between batches");
                tokio::time::sleep(self.batch_pause).await;
            }
            tracing::info!(
                run_id = %report.run_id,
                batch = index + 1,
                of = total,
                regions = ?batch.iter().map(RegionCode::as_str).collect::<Vec<_>>(),
                "dispatching batch"
            );
            let results = self.run_batch(batch, date).await;
            report.record_batch(results);
        }
    }

    async fn run_batch(&self, batch: &[RegionCode], date: SyncDate) -> Vec<TransactionResult> {
        let handles: Vec<_> = batch
            .iter()
            .map(|region| {
                let worker = Arc::clone(&self.worker);
                let policy = self.retry;
                let task_region = region.clone();
                let handle = tokio::spawn(async move {
                    let operation = format!("dlc {task_region} {date}");
                    retry_with_backoff(&policy, &operation, |_| worker.attempt(&task_region, date))
                        .await
                });
                (region.clone(), handle)
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for (region, handle) in handles {
            let result = match handle.await {
                Ok(attempted) => self.settle(&region, date, attempted),
                Err(e) => {
                    tracing::error!(%region, "region task aborted: {e}");
                    TransactionResult::failed(
                        region,
                        date,
                        None,
                        ErrorKind::Technical,
                        "region task aborted",
                        0,
                    )
                }
            };
            results.push(result);
        }
        results
    }

    /// Persist a finished region and produce its result.
    fn settle(
        &self,
        region: &RegionCode,
        date: SyncDate,
        attempted: Attempted<WorkflowOutcome, WorkflowError>,
    ) -> TransactionResult {
        let result = summarize(region, date, &attempted);
        match &attempted.result {
            Ok(outcome) => {
                if let Err(e) = self.persist(region, date, outcome) {
                    tracing::error!(%region, %date, "persisting results failed: {e}");
                    return TransactionResult::failed(
                        region.clone(),
                        date,
                        outcome.batch_id().cloned(),
                        ErrorKind::Technical,
                        "persisting results failed",
                        attempted.attempts,
                    );
                }
            }
            Err(e) => {
                tracing::warn!(%region, %date, attempts = attempted.attempts, kind = %e.error.kind(), "region failed: {e}");
            }
        }
        result
    }

    fn persist(
        &self,
        region: &RegionCode,
        date: SyncDate,
        outcome: &WorkflowOutcome,
    ) -> Result<(), StoreError> {
        let Some(batch_id) = outcome.batch_id() else {
            return Ok(());
        };
        let records = outcome.records();
        let meta = json!({
            "recordCount": records.len(),
            "fetchedAt": Utc::now().to_rfc3339(),
        });
        self.store.save_batch_result(region, date, batch_id, &meta)?;
        if !records.is_empty() {
            self.store.save_records(region, date, batch_id, records)?;
        }
        Ok(())
    }
}
