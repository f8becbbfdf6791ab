use anyhow::Result;
use bankledger::cli::Cli;
use bankledger::logging::init_logging;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    cli.run().await
}
