//! seoenrich CLI: fill in, check, and repair page SEO metadata.
//!
//! Works on a libSQL page table: `enrich` generates missing titles and
//! descriptions, `repair` regenerates the ones failing quality checks, and
//! `finalize` produces the publishable table.

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
