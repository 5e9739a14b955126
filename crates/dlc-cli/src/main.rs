//! # dlc-sync entry point
//!
//! Parses command-line arguments, installs the tracing subscriber, and
//! dispatches to the subcommand handlers in `dlc_cli`.

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use dlc_cli::keys::run_check_keys;
use dlc_cli::sync::{run_daemon, run_fetch, run_once, FetchArgs, RunArgs};

/// Digital life certificate synchronization client.
///
/// Pulls DLC records per region from the partner gateway over the signed,
/// encrypted envelope protocol. Configuration is read from `DLC_*`
/// environment variables.
#[derive(Parser, Debug)]
#[command(name = "dlc-sync", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run once across every configured region.
    ///
    /// Fetched records are kept in memory only and discarded on exit; the
    /// printed run report is the only output.
    Run(RunArgs),

    /// Fetch a single region with retry.
    Fetch(FetchArgs),

    /// Run on the configured cron schedule until interrupted.
    ///
    /// Fetched records are kept in memory only and discarded on exit.
    Daemon,

    /// Load key material and run the crypto self-checks.
    CheckKeys,
}

fn init_tracing(verbose: u8, json: bool) {
    // RUST_LOG wins when set; otherwise -v picks the level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "dlc-sync starting");

    let result = match &cli.command {
        Commands::Run(args) => run_once(args).await,
        Commands::Fetch(args) => run_fetch(args).await,
        Commands::Daemon => run_daemon().await,
        Commands::CheckKeys => run_check_keys(),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parse_run_without_date() {
        let cli = Cli::try_parse_from(["dlc-sync", "run"]).unwrap();
        if let Commands::Run(args) = cli.command {
            assert!(args.date.is_none());
        } else {
            panic!("expected run");
        }
        assert_eq!(cli.verbose, 0);
        assert!(!cli.json);
    }

    #[test]
    fn cli_parse_run_with_date() {
        let cli = Cli::try_parse_from(["dlc-sync", "run", "--date", "2025-01-15"]).unwrap();
        if let Commands::Run(args) = cli.command {
            assert_eq!(args.date.as_deref(), Some("2025-01-15"));
        }
    }

    #[test]
    fn cli_parse_fetch() {
        let cli = Cli::try_parse_from(["dlc-sync", "fetch", "--region", "ALPHA"]).unwrap();
        if let Commands::Fetch(args) = cli.command {
            assert_eq!(args.region, "ALPHA");
            assert!(args.date.is_none());
        } else {
            panic!("expected fetch");
        }
    }

    #[test]
    fn cli_parse_fetch_requires_region() {
        assert!(Cli::try_parse_from(["dlc-sync", "fetch"]).is_err());
    }

    #[test]
    fn cli_parse_daemon_and_check_keys() {
        let cli = Cli::try_parse_from(["dlc-sync", "daemon"]).unwrap();
        assert!(matches!(cli.command, Commands::Daemon));
        let cli = Cli::try_parse_from(["dlc-sync", "check-keys"]).unwrap();
        assert!(matches!(cli.command, Commands::CheckKeys));
    }

    #[test]
    fn cli_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["dlc-sync", "run", "-vv", "--json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
    }

    #[test]
    fn run_and_daemon_help_mention_in_memory_records() {
        use clap::CommandFactory;

        let mut cmd = Cli::command();
        for name in ["run", "daemon"] {
            let help = cmd
                .find_subcommand_mut(name)
                .unwrap()
                .render_long_help()
                .to_string();
            assert!(help.contains("kept in memory only"), "{name} help: {help}");
        }
    }

    #[test]
    fn cli_rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["dlc-sync", "sync-all"]).is_err());
    }
}
