use thiserror::Error;

/// Errors that can occur in syncstate-core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("invalid state type '{0}': expected one of legacy, global, stream")]
    InvalidStateKind(String),

    #[error("unexpected state blob: {0}")]
    AmbiguousState(String),

    #[error("malformed state message: {0}")]
    MalformedMessage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
