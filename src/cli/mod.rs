pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config;

#[derive(Parser)]
#[command(name = "bespin-api-rust")]
#[command(about = "Bespin API - path-dispatched actions with session login")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Port to listen on (overrides BESPIN_PORT)")]
        port: Option<u16>,

        #[arg(long, help = "Directory served for paths no handler owns")]
        static_dir: Option<PathBuf>,
    },

    #[command(about = "List every registered resource action")]
    Routes {
        #[arg(long, help = "Output in JSON format")]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        static_dir: None,
    }) {
        Commands::Serve { port, static_dir } => {
            let mut config = config::config().clone();
            if let Some(port) = port {
                config.server.port = port;
            }
            if static_dir.is_some() {
                config.server.static_dir = static_dir;
            }
            commands::serve::handle(config).await
        }
        Commands::Routes { json } => commands::routes::handle(OutputFormat::from_flag(json)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["bespin-api-rust"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn serve_flags_parse() {
        let args = ["bespin-api-rust", "serve", "--port", "4100", "--static-dir", "/srv/www"];
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Some(Commands::Serve { port, static_dir }) => {
                assert_eq!(port, Some(4100));
                assert_eq!(static_dir, Some(PathBuf::from("/srv/www")));
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn routes_json_flag_parses() {
        let cli = Cli::try_parse_from(["bespin-api-rust", "routes", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Routes { json: true })));
    }
}
