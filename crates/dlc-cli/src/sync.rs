//! # Sync Subcommands
//!
//! `run`, `fetch` and `daemon`. Each builds the gateway workflow from the
//! environment, so a missing key file or endpoint fails before any request.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use dlc_core::{RecordStore, RegionCode, SyncDate};
use dlc_gateway_client::{GatewayConfig, TransactionWorkflow};
use dlc_scheduler::{InMemoryRecordStore, SchedulerConfig, SyncScheduler};

use crate::exit_code_for;

/// Arguments for `dlc-sync run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Sync date (YYYY-MM-DD). Defaults to today minus `DLC_DATE_LAG_DAYS`.
    #[arg(long)]
    pub date: Option<String>,
}

/// Arguments for `dlc-sync fetch`.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Region code, e.g. `ALPHA`.
    #[arg(long)]
    pub region: String,

    /// Sync date (YYYY-MM-DD). Defaults to today minus `DLC_DATE_LAG_DAYS`.
    #[arg(long)]
    pub date: Option<String>,
}

fn workflow_from_env() -> Result<TransactionWorkflow> {
    let gateway = GatewayConfig::from_env().context("loading gateway configuration")?;
    tracing::info!(
        endpoint = %gateway.endpoint,
        environment = ?gateway.environment,
        "gateway configured"
    );
    if gateway.tls_verification_relaxed() {
        tracing::warn!("TLS certificate verification is disabled");
    }
    TransactionWorkflow::from_config(&gateway).context("building gateway workflow")
}

fn parse_date(raw: Option<&str>) -> Result<Option<SyncDate>> {
    raw.map(|d| SyncDate::parse(d).with_context(|| format!("invalid --date {d:?}")))
        .transpose()
}

/// Logged whenever `run` or `daemon` starts without a durable store.
pub const IN_MEMORY_STORE_NOTICE: &str =
    "fetched records are kept in memory only and discarded on exit";

fn record_store() -> Arc<dyn RecordStore> {
    tracing::warn!(store = "in-memory", "{IN_MEMORY_STORE_NOTICE}");
    Arc::new(InMemoryRecordStore::new())
}

fn scheduler_from_env() -> Result<SyncScheduler<TransactionWorkflow>> {
    let config = SchedulerConfig::from_env().context("loading scheduler configuration")?;
    let workflow = workflow_from_env()?;
    Ok(SyncScheduler::new(config, workflow, record_store()))
}

/// Execute `dlc-sync run`. Prints the run report as JSON; records themselves
/// are not persisted beyond the process.
pub async fn run_once(args: &RunArgs) -> Result<u8> {
    let date = parse_date(args.date.as_deref())?;
    let scheduler = scheduler_from_env()?;
    let report = scheduler.trigger(date).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(exit_code_for(report.status))
}

/// Execute `dlc-sync fetch`. Prints the transaction result as JSON.
pub async fn run_fetch(args: &FetchArgs) -> Result<u8> {
    let region = RegionCode::new(&args.region)
        .with_context(|| format!("invalid --region {:?}", args.region))?;
    let config = SchedulerConfig::from_env().context("loading scheduler configuration")?;
    let date = parse_date(args.date.as_deref())?
        .unwrap_or_else(|| SyncDate::days_ago(config.date_lag_days, config.utc_offset));
    let workflow = workflow_from_env()?;

    let result = workflow.run_with_retry(&region, date, &config.retry).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(if result.success { 0 } else { 1 })
}

/// Execute `dlc-sync daemon`. Returns only if the schedule ends or fails.
pub async fn run_daemon() -> Result<u8> {
    let scheduler = scheduler_from_env()?;
    if scheduler.config().regions.is_empty() {
        bail!("DLC_REGIONS is empty; nothing to schedule");
    }
    let scheduler = Arc::new(scheduler);
    tokio::select! {
        result = Arc::clone(&scheduler).run_forever() => {
            result.context("scheduler stopped")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for shutdown signal")?;
            tracing::info!("shutdown requested");
            if let Some(active) = scheduler.status().active {
                tracing::warn!(run_id = %active.run_id, "exiting with a run in progress");
            }
        }
    }
    Ok(0)
}
