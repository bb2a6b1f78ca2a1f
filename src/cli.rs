use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use batchgate::api::ServeOptions;

#[derive(Parser, Debug)]
#[command(name = "batchgate")]
#[command(about = "Batch lifecycle proxy and presigned URL broker", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Server(ServerArgs),
}

#[derive(clap::Args, Debug)]
pub struct ServerArgs {
    /// Address to bind to; defaults to `server.bind_addr` from configuration
    #[arg(long)]
    pub address: Option<SocketAddr>,

    /// Configuration file (default: `BATCHGATE_CONFIG` or `config/batchgate.toml`)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Keep batches in memory instead of calling the batch service
    #[arg(long)]
    pub fake_upstream: bool,
}

impl From<ServerArgs> for ServeOptions {
    fn from(args: ServerArgs) -> Self {
        ServeOptions {
            address: args.address,
            config_path: args.config,
            fake_upstream: args.fake_upstream,
        }
    }
}
