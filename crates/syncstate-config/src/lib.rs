mod error;
mod settings;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use settings::{JournalMode, StoreConfig, SyncStateConfig};
pub use validation::validate_config;
