use thiserror::Error;

/// Errors that can occur when loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("store path must not be empty")]
    EmptyStorePath,

    #[error("busy timeout must be a positive number of milliseconds, got {0}")]
    InvalidBusyTimeout(u64),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
