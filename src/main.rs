//! # insight-dataops command line
//!
//! ```text
//! main()
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   ├─> Initialize logging (files + console, console only as fallback)
//!   └─> Run the subcommand on the Tokio runtime
//! ```
//!
//! ```bash
//! insight-dataops inspect data/people.csv
//! insight-dataops apply data/people.csv --plan dedupe.json --output clean.csv
//! insight-dataops ask data/people.csv --instruction "fill the missing values"
//! ```

#![expect(clippy::print_stdout)] // command output goes to stdout

mod cli;

use anyhow::Result;
use clap::Parser as _;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    if let Err(file_err) = insight_dataops::logging::init() {
        insight_dataops::logging::init_console()?;
        tracing::warn!("File logging unavailable: {file_err:#}");
    }

    cli::run(cli).await
}
