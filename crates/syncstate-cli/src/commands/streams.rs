use anyhow::Result;
use syncstate_store::StreamCatalog;

use crate::cli::{format_stream, StreamsCommands};
use crate::config::ProjectConfig;

pub fn cmd_streams(config: ProjectConfig, command: StreamsCommands) -> Result<()> {
    let (_store, catalog) = config.open_store()?;

    match command {
        StreamsCommands::List { connection } => {
            let mut streams: Vec<String> = catalog
                .list_current_streams(connection)?
                .iter()
                .map(format_stream)
                .collect();

            if streams.is_empty() {
                println!("No streams configured for connection {}.", connection);
                return Ok(());
            }

            streams.sort();
            for stream in streams {
                println!("{}", stream);
            }
        }
        StreamsCommands::Register {
            connection,
            streams,
        } => {
            let added = catalog.register_streams(connection, &streams)?;
            println!("Registered {} new streams for connection {}.", added, connection);
        }
        StreamsCommands::Remove {
            connection,
            streams,
        } => {
            let removed = catalog.remove_streams(connection, &streams)?;
            println!("Removed {} streams from connection {}.", removed, connection);
        }
    }

    Ok(())
}
