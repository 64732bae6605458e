use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod cli;
mod commands;
mod config;

use cli::{Cli, Commands};
use commands::{
    cmd_delete_streams, cmd_erase, cmd_get, cmd_set, cmd_status, cmd_streams,
};
use config::ProjectConfig;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env.{ENV} when an environment is given, .env otherwise
    match &cli.env {
        Some(env) => {
            dotenvy::from_filename(format!(".env.{}", env)).ok();
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("syncstate=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    debug!(config = %cli.config.display(), "Loading configuration");
    let config = ProjectConfig::load(&cli.config)?;

    match cli.command {
        Commands::Get { connection } => cmd_get(config, connection),
        Commands::Set { connection, file } => cmd_set(config, connection, &file),
        Commands::Erase { connection, yes } => cmd_erase(config, connection, yes),
        Commands::DeleteStreams {
            connection,
            streams,
        } => cmd_delete_streams(config, connection, streams),
        Commands::Status => cmd_status(config),
        Commands::Streams { command } => cmd_streams(config, command),
    }
}
