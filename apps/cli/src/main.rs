//! dwh-report CLI: batch ETL report generator.
//!
//! Pulls tables from the configured relational databases and XML files,
//! applies per-source business rules, and writes one multi-sheet `.xlsx`
//! report with a summary sheet.

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
