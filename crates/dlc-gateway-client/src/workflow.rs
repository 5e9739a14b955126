//! # Transaction Workflow
//!
//! Two-phase protocol for one region/date pair: obtain a batch identifier,
//! then fetch the records for it.
//!
//! ## States
//!
//! ```text
//! Idle ──▶ AwaitingBatchId ──▶ BatchIdObtained ──▶ AwaitingRecords ──▶ Complete
//!                │                                                       ▲
//!                └────────────── no batches ─────────────────────────────┘
//!
//! any non-terminal state ──▶ Failed
//! ```
//!
//! Each attempt is sequential internally. A retry starts again from `Idle`
//! with fresh session keys.

use dlc_core::{BatchId, RegionCode, SyncDate, TransactionResult};
use dlc_crypto::{CryptoEngine, KeyMaterial};
use serde::Serialize;
use serde_json::Value;

use crate::config::GatewayConfig;
use crate::envelope::{EnvelopeCodec, TxnSubType};
use crate::error::GatewayError;
use crate::extract::{self, ApplicationStatus, BatchIdLookup};
use crate::retry::{self, Attempted, RetryPolicy, Retryable};
use crate::transport::TransportClient;

/// Phase of one workflow attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    AwaitingBatchId,
    BatchIdObtained,
    AwaitingRecords,
    Complete,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        use WorkflowState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, AwaitingBatchId)
            | (AwaitingBatchId, BatchIdObtained)
            | (AwaitingBatchId, Complete)
            | (BatchIdObtained, AwaitingRecords)
            | (AwaitingRecords, Complete) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::AwaitingBatchId => "awaiting_batch_id",
            Self::BatchIdObtained => "batch_id_obtained",
            Self::AwaitingRecords => "awaiting_records",
            Self::Complete => "complete",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Successful end of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    Completed {
        batch_id: BatchId,
        records: Vec<Value>,
    },
    /// No batches, or a batch with no records.
    NoData { batch_id: Option<BatchId> },
}

impl WorkflowOutcome {
    pub fn batch_id(&self) -> Option<&BatchId> {
        match self {
            Self::Completed { batch_id, .. } => Some(batch_id),
            Self::NoData { batch_id } => batch_id.as_ref(),
        }
    }

    pub fn records(&self) -> &[Value] {
        match self {
            Self::Completed { records, .. } => records,
            Self::NoData { .. } => &[],
        }
    }
}

/// Failed end of one attempt.
#[derive(Debug, thiserror::Error)]
#[error("{error} (while {failed_in})")]
pub struct WorkflowError {
    #[source]
    pub error: GatewayError,
    /// State the attempt was in when it failed.
    pub failed_in: WorkflowState,
    /// Set when phase one had already succeeded.
    pub batch_id: Option<BatchId>,
}

impl Retryable for WorkflowError {
    fn is_retryable(&self) -> bool {
        self.error.is_retryable()
    }
}

struct StateTracker<'a> {
    region: &'a RegionCode,
    state: WorkflowState,
}

impl<'a> StateTracker<'a> {
    fn new(region: &'a RegionCode) -> Self {
        Self {
            region,
            state: WorkflowState::Idle,
        }
    }

    fn advance(&mut self, next: WorkflowState) -> Result<(), WorkflowError> {
        if !self.state.can_transition_to(next) {
            return Err(WorkflowError {
                error: GatewayError::InvalidTransition {
                    from: self.state,
                    to: next,
                },
                failed_in: self.state,
                batch_id: None,
            });
        }
        tracing::trace!(region = %self.region, from = %self.state, to = %next, "workflow transition");
        self.state = next;
        Ok(())
    }

    fn fail(&mut self, error: GatewayError, batch_id: Option<BatchId>) -> WorkflowError {
        let failed_in = self.state;
        self.state = WorkflowState::Failed;
        tracing::debug!(region = %self.region, %failed_in, "workflow failed: {error}");
        WorkflowError {
            error,
            failed_in,
            batch_id,
        }
    }
}

/// Reply of one exchange after application status is checked.
enum Reply {
    Data(Value),
    NoData,
}

/// Drives the two-phase protocol against one gateway endpoint.
///
/// Cheap to clone; clones share the HTTP connection pool and key material.
#[derive(Debug, Clone)]
pub struct TransactionWorkflow {
    codec: EnvelopeCodec,
    transport: TransportClient,
    max_payload_bytes: usize,
}

impl TransactionWorkflow {
    pub fn new(codec: EnvelopeCodec, transport: TransportClient, max_payload_bytes: usize) -> Self {
        Self {
            codec,
            transport,
            max_payload_bytes,
        }
    }

    /// Load key material from the configured paths and build the workflow.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let keys = KeyMaterial::load(
            &config.partner_cert_path,
            &config.private_key_path,
            &config.public_cert_path,
        )?;
        Self::with_engine(config, CryptoEngine::new(keys, config.key_wrap))
    }

    /// Build the workflow around an existing engine.
    pub fn with_engine(config: &GatewayConfig, crypto: CryptoEngine) -> Result<Self, GatewayError> {
        let codec = EnvelopeCodec::new(
            crypto,
            config.source_id.clone(),
            config.destination.clone(),
            config.reference_source.clone(),
        )?
        .with_reference_offset(config.utc_offset);
        let transport = TransportClient::new(config)?;
        Ok(Self::new(codec, transport, config.max_payload_bytes))
    }

    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    /// Phase one: ask for the batch identifier.
    pub async fn get_batch_id(
        &self,
        region: &RegionCode,
        date: SyncDate,
    ) -> Result<BatchIdLookup, GatewayError> {
        match self.exchange(TxnSubType::GetBatchId, region, date, None).await? {
            Reply::NoData => Ok(BatchIdLookup::NoBatches),
            Reply::Data(body) => extract::extract_batch_id(&body),
        }
    }

    /// Phase two: fetch the records of a batch.
    ///
    /// An empty list means the batch holds nothing.
    ///
    /// # Errors
    ///
    /// `PayloadTooLarge` if the serialized records exceed the ceiling.
    pub async fn fetch_records(
        &self,
        region: &RegionCode,
        date: SyncDate,
        batch_id: &BatchId,
    ) -> Result<Vec<Value>, GatewayError> {
        let body = match self
            .exchange(TxnSubType::FetchRecords, region, date, Some(batch_id))
            .await?
        {
            Reply::NoData => return Ok(Vec::new()),
            Reply::Data(body) => body,
        };

        let records = match extract::extract_records(&body) {
            Some(records) => records,
            None if extract::reports_zero_count(&body) => Vec::new(),
            None => {
                return Err(GatewayError::MalformedResponse(
                    "response carries no record list".into(),
                ))
            }
        };

        let size = serde_json::to_vec(&records)?.len();
        if size > self.max_payload_bytes {
            tracing::warn!(
                %region,
                %batch_id,
                size,
                limit = self.max_payload_bytes,
                "record payload over ceiling"
            );
            return Err(GatewayError::PayloadTooLarge {
                size,
                limit: self.max_payload_bytes,
            });
        }
        Ok(records)
    }

    /// One attempt at both phases.
    pub async fn run(
        &self,
        region: &RegionCode,
        date: SyncDate,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let mut state = StateTracker::new(region);

        state.advance(WorkflowState::AwaitingBatchId)?;
        let lookup = self
            .get_batch_id(region, date)
            .await
            .map_err(|e| state.fail(e, None))?;

        let batch_id = match lookup {
            BatchIdLookup::NoBatches => {
                state.advance(WorkflowState::Complete)?;
                tracing::info!(%region, %date, "no batches");
                return Ok(WorkflowOutcome::NoData { batch_id: None });
            }
            BatchIdLookup::Found(id) => id,
        };
        state.advance(WorkflowState::BatchIdObtained)?;

        state.advance(WorkflowState::AwaitingRecords)?;
        let records = self
            .fetch_records(region, date, &batch_id)
            .await
            .map_err(|e| state.fail(e, Some(batch_id.clone())))?;
        state.advance(WorkflowState::Complete)?;

        tracing::info!(%region, %date, %batch_id, records = records.len(), "records fetched");
        if records.is_empty() {
            Ok(WorkflowOutcome::NoData {
                batch_id: Some(batch_id),
            })
        } else {
            Ok(WorkflowOutcome::Completed { batch_id, records })
        }
    }

    /// Run attempts under `policy` and return every attempt's final result.
    pub async fn run_attempts(
        &self,
        region: &RegionCode,
        date: SyncDate,
        policy: &RetryPolicy,
    ) -> Attempted<WorkflowOutcome, WorkflowError> {
        let operation = format!("dlc {region} {date}");
        retry::retry_with_backoff(policy, &operation, |_| self.run(region, date)).await
    }

    /// Run with retries and summarise.
    pub async fn run_with_retry(
        &self,
        region: &RegionCode,
        date: SyncDate,
        policy: &RetryPolicy,
    ) -> TransactionResult {
        let attempted = self.run_attempts(region, date, policy).await;
        summarize(region, date, &attempted)
    }

    async fn exchange(
        &self,
        sub_type: TxnSubType,
        region: &RegionCode,
        date: SyncDate,
        batch_id: Option<&BatchId>,
    ) -> Result<Reply, GatewayError> {
        let request = self.codec.plain_request(sub_type, region, date, batch_id)?;
        let sealed = self.codec.build_envelope(&request)?;
        let raw = self
            .transport
            .send(&sealed.envelope, &sealed.access_token)
            .await?;
        let response = self.codec.parse_response(&raw.body, &sealed.session_key)?;

        match extract::application_status(&response.body) {
            ApplicationStatus::NoData { code, description } => {
                tracing::info!(%region, %sub_type, %code, %description, "gateway reports no data");
                Ok(Reply::NoData)
            }
            ApplicationStatus::Error { code, description } => {
                Err(GatewayError::Application { code, description })
            }
            ApplicationStatus::Ok if raw.status >= 400 => {
                Err(GatewayError::rejected(raw.status, &response.body.to_string()))
            }
            ApplicationStatus::Ok => Ok(Reply::Data(response.body)),
        }
    }
}

/// Fold an attempted run into the result the scheduler reports.
pub fn summarize(
    region: &RegionCode,
    date: SyncDate,
    attempted: &Attempted<WorkflowOutcome, WorkflowError>,
) -> TransactionResult {
    let attempts = attempted.attempts;
    match &attempted.result {
        Ok(WorkflowOutcome::Completed { batch_id, records }) => TransactionResult::completed(
            region.clone(),
            date,
            batch_id.clone(),
            records.len(),
            attempts,
        ),
        Ok(WorkflowOutcome::NoData { batch_id }) => {
            TransactionResult::no_data(region.clone(), date, batch_id.clone(), attempts)
        }
        Err(e) => TransactionResult::failed(
            region.clone(),
            date,
            e.batch_id.clone(),
            e.error.kind(),
            e.error.report_message(),
            attempts,
        ),
    }
}
