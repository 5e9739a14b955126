//! # dlc-cli: Command-Line Entry Point for dlc-sync
//!
//! Provides the `dlc-sync` binary. All configuration comes from `DLC_*`
//! environment variables (see `GatewayConfig::from_env` and
//! `SchedulerConfig::from_env`); flags only select what to do.
//!
//! ## Subcommands
//!
//! - `dlc-sync run`: One full run across every configured region.
//! - `dlc-sync fetch`: A single region, with retry.
//! - `dlc-sync daemon`: The cron loop.
//! - `dlc-sync check-keys`: Load key material and run the crypto self-checks.
//!
//! ```bash
//! dlc-sync run --date 2025-01-15
//! dlc-sync fetch --region ALPHA
//! dlc-sync -vv daemon
//! ```

pub mod keys;
pub mod sync;

use dlc_core::RunStatus;

/// Process exit code for a finished run.
pub fn exit_code_for(status: RunStatus) -> u8 {
    match status {
        RunStatus::Success => 0,
        RunStatus::PartialSuccess => 2,
        RunStatus::Running | RunStatus::Failed => 1,
    }
}
