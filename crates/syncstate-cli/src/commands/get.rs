use anyhow::{Context, Result};
use syncstate_core::to_state_blob;
use syncstate_store::StateStore;
use uuid::Uuid;

use crate::config::ProjectConfig;

pub fn cmd_get(config: ProjectConfig, connection: Uuid) -> Result<()> {
    let (store, _catalog) = config.open_store()?;

    let state = store
        .get_current_state(connection)
        .with_context(|| format!("Failed to read state of connection {}", connection))?;

    match state {
        Some(state) => {
            let blob = to_state_blob(&state)?;
            println!("{}", serde_json::to_string_pretty(&blob)?);
        }
        None => eprintln!("No state found for connection {}.", connection),
    }

    Ok(())
}
