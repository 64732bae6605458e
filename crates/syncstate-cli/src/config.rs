use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use syncstate_config::{StoreConfig, SyncStateConfig};
use syncstate_store::{SqliteStateStore, SqliteStreamCatalog};
use tracing::info;

/// Project configuration from syncstate.toml
#[derive(Debug, Default)]
pub struct ProjectConfig {
    pub settings: SyncStateConfig,
}

impl ProjectConfig {
    /// Load the config file, falling back to defaults when it doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }

        let settings = SyncStateConfig::load(path)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?;
        Ok(Self { settings })
    }

    /// Resolve environment variables in a string.
    /// Supports ${VAR_NAME} syntax.
    pub fn resolve_env(&self, s: &str) -> String {
        let mut result = s.to_string();

        while let Some(start) = result.find("${") {
            if let Some(end) = result[start..].find('}') {
                let var_name = &result[start + 2..start + end];
                let value = std::env::var(var_name).unwrap_or_default();
                result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
            } else {
                break;
            }
        }

        result
    }

    /// Store configuration with environment references resolved.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            path: self.resolve_env(&self.settings.store.path),
            ..self.settings.store.clone()
        }
    }

    /// Open the state store together with the stream catalog kept in the
    /// same database file.
    pub fn open_store(&self) -> Result<(SqliteStateStore, Arc<SqliteStreamCatalog>)> {
        let store_config = self.store_config();
        let catalog = Arc::new(
            SqliteStreamCatalog::open(&store_config.path)
                .with_context(|| format!("Failed to open stream catalog at {}", store_config.path))?,
        );
        let store = SqliteStateStore::from_config(&store_config, catalog.clone())
            .with_context(|| format!("Failed to open state store at {}", store_config.path))?;
        Ok((store, catalog))
    }
}
