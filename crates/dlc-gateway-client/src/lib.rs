//! # dlc-gateway-client: Partner Gateway Client
//!
//! Everything between a `(region, date)` pair and the partner's records:
//!
//! - [`envelope`]: builds signed, encrypted request envelopes and opens
//!   responses (encrypted or plain).
//! - [`transport`]: one HTTP POST per envelope, failures classified.
//! - [`extract`]: batch-id, record-list, and application-status extraction
//!   from variably shaped response bodies.
//! - [`workflow`]: the two-phase protocol and its state machine.
//! - [`retry`]: retry combinator with optional exponential backoff.
//!
//! ## Crate Policy
//!
//! - One `TransactionWorkflow` per process; clone it into region tasks.
//! - No retries below [`workflow`]. The transport sends exactly once.
//! - A session key never outlives the request/response pair it sealed.

pub mod config;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod reference;
pub mod retry;
pub mod transport;
pub mod workflow;

pub use config::{
    default_utc_offset, env_flag, env_parsed, env_utc_offset, utc_offset_from_minutes, ConfigError,
    GatewayConfig, GatewayEnvironment, DEFAULT_UTC_OFFSET_MINUTES,
};
pub use envelope::{
    EisPayload, Envelope, EnvelopeCodec, PlainRequest, PlainResponse, ResponseEnvelope,
    SealedRequest, TxnSubType,
};
pub use error::GatewayError;
pub use extract::BatchIdLookup;
pub use reference::ReferenceNumber;
pub use retry::{Attempted, RetryPolicy, Retryable};
pub use transport::{RawResponse, TransportClient, ACCESS_TOKEN_HEADER};
pub use workflow::{TransactionWorkflow, WorkflowError, WorkflowOutcome, WorkflowState};
