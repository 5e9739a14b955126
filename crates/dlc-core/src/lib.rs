//! # dlc-core: Foundational Types for dlc-sync
//!
//! Shared vocabulary for the digital life certificate synchronization
//! workspace. Every other crate depends on `dlc-core`; it depends on
//! nothing internal.
//!
//! ## Contents
//!
//! - **Identifiers**: `RegionCode`, `BatchId`, `RunId`. Validated newtypes,
//!   no bare strings crossing crate boundaries.
//! - **Dates**: `SyncDate`, the calendar day a fetch is keyed on.
//! - **Outcomes**: `TransactionResult` for one region/date, `RunReport` for a
//!   whole run across regions.
//! - **Ports**: `RecordStore` and `ReportSink`, the seams through which
//!   fetched data and run reports leave this system.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `dlc-*` crates.
//! - No `.unwrap()` outside tests.

pub mod error;
pub mod identity;
pub mod ports;
pub mod report;
pub mod result;
pub mod temporal;

pub use error::ValidationError;
pub use identity::{BatchId, RegionCode, RunId};
pub use ports::{RecordStore, ReportSink, StoreError};
pub use report::{RegionError, RunReport, RunStatus};
pub use result::{ErrorKind, TransactionOutcome, TransactionResult};
pub use temporal::SyncDate;
