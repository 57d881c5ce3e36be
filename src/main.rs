use anyhow::Result;
use cenerg::cli::Cli;
use cenerg::observability;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing(cli.verbose);
    cli.run().await
}
