//! ChainFeed CLI: runs the Solana `logsSubscribe` to Redis bridge.
//!
//! # Commands
//! ```text
//! chainfeed run      [--config <path.yaml>] [--dry-run]
//! chainfeed check    [--config <path.yaml>]
//! chainfeed requests [--config <path.yaml>]
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd_inspect;
mod cmd_run;

#[derive(Parser)]
#[command(
    name = "chainfeed",
    about = "Solana logsSubscribe to Redis queue bridge (ChainFeed CLI)",
    long_about = "
ChainFeed CLI: subscribe to a Solana node's logs over WebSocket, keep the
subscription alive across disconnects, and push every matching notification
onto a Redis list.

ENVIRONMENT VARIABLES:
  CHAINFEED_CONFIG         Path to the YAML configuration file
  CHAINFEED_UPSTREAM_URL   ws:// or wss:// node endpoint
  CHAINFEED_COMMITMENT     processed | confirmed | finalized
  CHAINFEED_QUEUE_URL      redis:// or rediss:// URL
  CHAINFEED_QUEUE_NAME     Redis list name (default: solana_analyze_queue)
  CHAINFEED_WATCH          Comma-separated watched identifiers
  CHAINFEED_ON_EMPTY       pass_through | fail_fast | wait
  CHAINFEED_LOG_LEVEL      trace | debug | info | warn | error
  RUST_LOG                 Full tracing filter, overrides the log level
",
    version
)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, global = true, env = "CHAINFEED_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bridge and run until SIGINT/SIGTERM
    Run {
        /// Publish to an in-process queue and log payloads instead of Redis
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the configuration and print a summary
    Check,

    /// Print the subscription requests the bridge would send
    Requests,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Run { dry_run } => cmd_run::run(config, dry_run).await,
        Commands::Check => cmd_inspect::check(config),
        Commands::Requests => cmd_inspect::requests(config),
    }
}
