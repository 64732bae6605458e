use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Confirm;
use syncstate_store::StateStore;
use uuid::Uuid;

use crate::config::ProjectConfig;

pub fn cmd_erase(config: ProjectConfig, connection: Uuid, yes: bool) -> Result<()> {
    if !yes {
        println!("{}", "WARNING: Dangerous Operation".red().bold());
        println!("The next sync of connection {} will start from scratch.", connection);

        let confirmed = Confirm::new()
            .with_prompt("Erase all state of this connection?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborting.");
            return Ok(());
        }
    }

    let (store, _catalog) = config.open_store()?;
    store
        .erase_state(connection)
        .with_context(|| format!("Failed to erase state of connection {}", connection))?;

    println!("{}", format!("Erased state of connection {}.", connection).green());
    Ok(())
}
