//! Aggregator exporter binary.
//!
//! Exports every table of the aggregator database as CSV into a local
//! directory or an S3 bucket. All database operations are read-only.

use aggregator_exporter::{Cli, run};
use clap::Parser;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    run(&cli).await.into()
}
