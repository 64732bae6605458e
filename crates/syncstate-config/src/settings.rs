use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};
use crate::validation::validate_config;

/// Top-level configuration as parsed from `syncstate.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct SyncStateConfig {
    /// State database configuration.
    #[serde(default)]
    pub store: StoreConfig,
}

impl SyncStateConfig {
    /// Parse and validate a config from a TOML string.
    pub fn parse(toml_str: &str) -> ConfigResult<Self> {
        let config: SyncStateConfig = toml::from_str(toml_str)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }
}

/// State database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file. May contain `${VAR}` references.
    #[serde(default = "default_path")]
    pub path: String,
    /// How long a writer waits on a locked database.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// SQLite journal mode.
    #[serde(default)]
    pub journal_mode: JournalMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: JournalMode::default(),
        }
    }
}

fn default_path() -> String {
    "syncstate.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// SQLite journal mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalMode {
    #[default]
    Wal,
    Delete,
}

impl JournalMode {
    /// Value for `PRAGMA journal_mode`.
    pub fn pragma_value(self) -> &'static str {
        match self {
            JournalMode::Wal => "wal",
            JournalMode::Delete => "delete",
        }
    }
}
