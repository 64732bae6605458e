use std::collections::BTreeSet;

use syncstate_core::StateKind;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Core(#[from] syncstate_core::Error),

    #[error(
        "inconsistent state types for connection {connection_id} ({})",
        join_kinds(.kinds)
    )]
    Inconsistent {
        connection_id: Uuid,
        kinds: BTreeSet<StateKind>,
    },

    #[error(
        "unexpected type migration from '{from}' to '{to}'; migration of state type needs to go through an explicit reset"
    )]
    MigrationNotAllowed { from: StateKind, to: StateKind },

    #[error("invalid row in state table: {0}")]
    InvalidRow(String),

    #[error("state store lock poisoned")]
    LockPoisoned,
}

impl StateError {
    /// Data-integrity faults must halt the sync and are never retried.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(
            self,
            StateError::Inconsistent { .. } | StateError::MigrationNotAllowed { .. }
        )
    }
}

fn join_kinds(kinds: &BTreeSet<StateKind>) -> String {
    kinds
        .iter()
        .map(|k| k.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type StateResult<T> = Result<T, StateError>;
