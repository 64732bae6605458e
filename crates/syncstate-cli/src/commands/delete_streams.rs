use std::collections::HashSet;

use anyhow::{Context, Result};
use colored::Colorize;
use syncstate_core::StreamDescriptor;
use syncstate_store::StateStore;
use uuid::Uuid;

use crate::cli::format_stream;
use crate::config::ProjectConfig;

pub fn cmd_delete_streams(
    config: ProjectConfig,
    connection: Uuid,
    streams: Vec<StreamDescriptor>,
) -> Result<()> {
    let (store, _catalog) = config.open_store()?;

    let to_delete: HashSet<StreamDescriptor> = streams.into_iter().collect();
    store
        .bulk_delete(connection, &to_delete)
        .with_context(|| format!("Failed to delete stream state of connection {}", connection))?;

    let mut names: Vec<String> = to_delete.iter().map(format_stream).collect();
    names.sort();
    println!(
        "{} state of {} for connection {}",
        "Deleted".green(),
        names.join(", "),
        connection
    );

    match store.get_current_state(connection)? {
        Some(state) => println!("{} streams remain in state.", state.stream_states().len()),
        None => println!("The connection has no state left."),
    }
    Ok(())
}
