use crate::error::{ConfigError, ConfigResult};
use crate::settings::SyncStateConfig;

/// Validate a parsed configuration.
pub fn validate_config(config: &SyncStateConfig) -> ConfigResult<()> {
    validate_store_path(config)?;
    validate_busy_timeout(config)?;
    Ok(())
}

fn validate_store_path(config: &SyncStateConfig) -> ConfigResult<()> {
    if config.store.path.trim().is_empty() {
        return Err(ConfigError::EmptyStorePath);
    }
    Ok(())
}

fn validate_busy_timeout(config: &SyncStateConfig) -> ConfigResult<()> {
    if config.store.busy_timeout_ms == 0 {
        return Err(ConfigError::InvalidBusyTimeout(0));
    }
    Ok(())
}
