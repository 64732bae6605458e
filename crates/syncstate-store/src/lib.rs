//! Persistence of connection sync state.
//!
//! A connection's state is stored as one row per stream, plus an optional
//! shared row for global and legacy state. All rows of a connection carry the
//! same [`StateKind`]; the only kind change a write may perform is moving a
//! legacy state to global or stream state.

mod batch;
mod catalog;
mod error;
mod predicate;
mod record;
mod schema;
mod sqlite;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use syncstate_core::{StateKind, StateWrapper, StreamDescriptor};
use uuid::Uuid;

pub use batch::{FlushSummary, PlannedCreate, PlannedUpdate, StateUpdateBatch};
pub use catalog::{SqliteStreamCatalog, StaticStreamCatalog, StreamCatalog};
pub use error::{StateError, StateResult};
pub use record::{build_state, resolve_kind, RowKey, StateRecord};
pub use sqlite::{is_migration, SqliteStateStore};

/// Overview of the state held for one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSummary {
    pub connection_id: Uuid,
    /// Every kind found among the rows. More than one means the state is corrupt.
    pub kinds: Vec<StateKind>,
    pub row_count: usize,
    pub last_updated: DateTime<Utc>,
}

/// Trait for state storage backends.
pub trait StateStore: Send + Sync {
    /// Get the current state of a connection, or `None` if it has none.
    fn get_current_state(&self, connection_id: Uuid) -> StateResult<Option<StateWrapper>>;

    /// Create or update the rows described by `state`. Null payloads delete
    /// their row.
    ///
    /// Fails with [`StateError::MigrationNotAllowed`] when the stored state has
    /// a different kind and is not legacy state.
    fn update_or_create_state(&self, connection_id: Uuid, state: &StateWrapper) -> StateResult<()>;

    /// Remove every state row of a connection.
    fn erase_state(&self, connection_id: Uuid) -> StateResult<()>;

    /// Remove the state of specific streams.
    ///
    /// Falls back to [`StateStore::erase_state`] when no tracked or configured
    /// stream would remain.
    fn bulk_delete(
        &self,
        connection_id: Uuid,
        streams_to_delete: &HashSet<StreamDescriptor>,
    ) -> StateResult<()>;

    /// Summaries of every connection that has state.
    fn list_connections(&self) -> StateResult<Vec<ConnectionSummary>>;
}
