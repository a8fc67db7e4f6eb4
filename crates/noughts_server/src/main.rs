//! Noughts - authoritative tic-tac-toe server.

#![warn(missing_docs)]

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use noughts_server::ServerConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            static_dir,
        } => {
            let config = ServerConfig::load(config.as_deref())?.with_overrides(host, port, static_dir);
            config.validate()?;
            noughts_server::run(config).await
        }
        Command::Config { config } => {
            let config = ServerConfig::load(config.as_deref())?;
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}
