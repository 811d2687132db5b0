use anyhow::Result;
use clap::Parser;

use charlab::{cli, summary};

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let results = cli::run(args).await?;
    // Exit status reflects the worst result in the table.
    std::process::exit(summary::exit_status(&results));
}
