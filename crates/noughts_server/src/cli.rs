//! Command-line interface for noughts.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Noughts - authoritative tic-tac-toe server
#[derive(Parser, Debug)]
#[command(name = "noughts")]
#[command(about = "Authoritative two-player tic-tac-toe over WebSockets", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the game server
    Serve {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory of static client files
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Path to a TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags() {
        let cli = Cli::try_parse_from(["noughts", "serve", "--port", "4000", "--host", "0.0.0.0"])
            .unwrap();
        match cli.command {
            Command::Serve { port, host, config, .. } => {
                assert_eq!(port, Some(4000));
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
                assert!(config.is_none());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["noughts"]).is_err());
    }
}
