//! Demonstration binary: runs the detachment scenarios and prints timings.

use clap::Parser;

use detached_context::cli::Cli;
use detached_context::observability;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads env-backed flags.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    observability::init_tracing(cli.json_logs);

    cli.run().await
}
