//! sieve CLI: turns crawler link dumps into enriched company records.
//!
//! Reads crawler NDJSON, runs the analyser pipeline and appends the enriched
//! records to the run directory.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
