mod cli;

use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    batchgate::observability::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => batchgate::api::run(args.into()).await?,
    }

    Ok(())
}
