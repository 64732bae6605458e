use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use syncstate_core::typed_state;
use syncstate_store::StateStore;
use uuid::Uuid;

use crate::config::ProjectConfig;

pub fn cmd_set(config: ProjectConfig, connection: Uuid, file: &Path) -> Result<()> {
    let content = fs::read_to_string(file)
        .with_context(|| format!("Failed to read checkpoint file: {}", file.display()))?;
    let blob: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Checkpoint file is not valid JSON: {}", file.display()))?;

    let Some(state) = typed_state(Some(&blob)).context("Failed to classify checkpoint")? else {
        println!("Checkpoint is empty. Nothing to write.");
        return Ok(());
    };

    let (store, _catalog) = config.open_store()?;
    store
        .update_or_create_state(connection, &state)
        .with_context(|| format!("Failed to save state of connection {}", connection))?;

    println!(
        "{} {} state for connection {} ({} streams)",
        "Saved".green(),
        state.kind(),
        connection,
        state.stream_states().len()
    );
    Ok(())
}
