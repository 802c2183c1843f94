use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use slv_leads::config::{load_local_env_overrides, ServiceConfig};

mod cli;

use cli::{cmd_serve, init_logging, ServeArgs};

/// SLV lead capture backend
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable debug mode
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    log_json: bool,

    /// Dotenv-style file applied before reading the environment
    #[arg(long, value_name = "FILE", default_value = ".env")]
    env_file: PathBuf,

    #[command(flatten)]
    serve: ServeArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level, cli.debug, cli.log_json)?;

    info!("Starting slv-leads v{}", env!("CARGO_PKG_VERSION"));

    load_local_env_overrides(&cli.env_file);
    let config = ServiceConfig::from_env();

    match cmd_serve(cli.serve, config).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Server failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
