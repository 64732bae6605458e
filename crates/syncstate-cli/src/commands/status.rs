use anyhow::Result;
use colored::Colorize;
use syncstate_store::StateStore;

use crate::config::ProjectConfig;

pub fn cmd_status(config: ProjectConfig) -> Result<()> {
    let (store, _catalog) = config.open_store()?;

    let connections = store.list_connections()?;

    if connections.is_empty() {
        println!("No sync state found.");
        return Ok(());
    }

    println!("\nSync State:");
    println!("{:<38} {:<14} {:>6} {:>27}", "Connection", "Type", "Rows", "Updated");
    println!("{:-<88}", "");

    for summary in connections {
        let kinds: Vec<&str> = summary.kinds.iter().map(|k| k.as_str()).collect();
        let kind = if kinds.len() == 1 {
            kinds[0].normal()
        } else {
            format!("{} (INCONSISTENT)", kinds.join("+")).red().bold()
        };

        println!(
            "{:<38} {:<14} {:>6} {:>27}",
            summary.connection_id.to_string(),
            kind,
            summary.row_count,
            summary.last_updated.to_rfc3339()
        );
    }

    println!();
    Ok(())
}
