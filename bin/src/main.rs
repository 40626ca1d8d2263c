//! busylight CLI - Loading-state coordination demos.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;

mod commands;
mod display;

#[derive(Parser)]
#[command(name = "busylight")]
#[command(about = "Simulate overlapping work against busylight indicators", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (suppress progress output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// JSON configuration file (min_display_time_ms, poll_interval_ms, ...)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run overlapping operations against one shared indicator
    Indicator {
        /// Number of simulated operations
        #[arg(short = 'n', long, default_value = "8")]
        ops: usize,

        /// Minimum display time override (milliseconds)
        #[arg(short, long)]
        min_display_ms: Option<u64>,

        /// Spread of operation durations (milliseconds)
        #[arg(short, long, default_value = "1500")]
        spread_ms: u64,

        /// Make every K-th operation fail
        #[arg(long)]
        fail_every: Option<usize>,
    },

    /// Run overlapping work across namespaces of a shared registry
    Registry {
        /// Number of namespaces
        #[arg(short, long, default_value = "3")]
        regions: usize,

        /// Operations started in each namespace
        #[arg(short, long, default_value = "4")]
        ops_per_region: usize,

        /// Give up waiting after this many milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // Show help if no command provided
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    let config = display::load_config(cli.config.as_deref())?;

    match command {
        Commands::Indicator {
            ops,
            min_display_ms,
            spread_ms,
            fail_every,
        } => {
            commands::indicator::run(
                config,
                ops,
                min_display_ms,
                spread_ms,
                fail_every,
                cli.quiet,
            )
            .await
        }
        Commands::Registry {
            regions,
            ops_per_region,
            timeout_ms,
        } => commands::registry::run(config, regions, ops_per_region, timeout_ms, cli.quiet).await,
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
