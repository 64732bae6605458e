use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use syncstate_config::StoreConfig;
use syncstate_core::{StateKind, StateWrapper, StreamDescriptor};
use tracing::{debug, info};
use uuid::Uuid;

use crate::batch::StateUpdateBatch;
use crate::catalog::StreamCatalog;
use crate::error::{StateError, StateResult};
use crate::predicate::{
    delete_streams_params, delete_streams_sql, row_exists, MAX_KEYS_PER_STATEMENT,
};
use crate::record::{build_state, RowKey, StateRecord};
use crate::schema::ensure_state_schema;
use crate::{ConnectionSummary, StateStore};

/// SQLite-backed state store.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
    catalog: Arc<dyn StreamCatalog>,
}

impl SqliteStateStore {
    /// Open or create a state store at the given path.
    pub fn open(path: impl AsRef<Path>, catalog: Arc<dyn StreamCatalog>) -> StateResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening state store");

        let conn = Connection::open(path)?;
        Self::init(conn, catalog)
    }

    /// Open a state store as described by the store configuration.
    pub fn from_config(config: &StoreConfig, catalog: Arc<dyn StreamCatalog>) -> StateResult<Self> {
        info!(
            path = %config.path,
            journal_mode = config.journal_mode.pragma_value(),
            "Opening state store"
        );

        let conn = Connection::open(&config.path)?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        // journal_mode returns the resulting mode as a row.
        let _: String = conn.query_row(
            &format!("PRAGMA journal_mode = {}", config.journal_mode.pragma_value()),
            [],
            |row| row.get(0),
        )?;
        Self::init(conn, catalog)
    }

    /// Create an in-memory state store (for testing).
    pub fn in_memory(catalog: Arc<dyn StreamCatalog>) -> StateResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn, catalog)
    }

    fn init(conn: Connection, catalog: Arc<dyn StreamCatalog>) -> StateResult<Self> {
        ensure_state_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            catalog,
        })
    }

    fn lock(&self) -> StateResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }
}

/// Only a legacy state may change kind, and only to a non-legacy kind.
pub fn is_migration(previous: Option<StateKind>, next: StateKind) -> bool {
    previous == Some(StateKind::Legacy) && next != StateKind::Legacy
}

fn load_records(conn: &Connection, connection_id: Uuid) -> StateResult<Vec<StateRecord>> {
    let mut stmt = conn.prepare(
        "SELECT type, stream_name, namespace, state FROM state
         WHERE connection_id = ?1
         ORDER BY created_at, rowid",
    )?;

    let rows = stmt.query_map([connection_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (kind, stream_name, namespace, stored) = row?;
        records.push(StateRecord::decode(&kind, stream_name, namespace, &stored)?);
    }

    Ok(records)
}

fn current_state(conn: &Connection, connection_id: Uuid) -> StateResult<Option<StateWrapper>> {
    build_state(connection_id, load_records(conn, connection_id)?)
}

fn plan_write(
    conn: &Connection,
    batch: &mut StateUpdateBatch,
    connection_id: Uuid,
    key: RowKey,
    kind: StateKind,
    payload: Option<&serde_json::Value>,
) -> StateResult<()> {
    let exists = row_exists(conn, connection_id, &key)?;
    batch.plan(key, kind, payload, exists)
}

fn plan_state(
    conn: &Connection,
    batch: &mut StateUpdateBatch,
    connection_id: Uuid,
    state: &StateWrapper,
) -> StateResult<()> {
    match state {
        StateWrapper::Legacy { state } => plan_write(
            conn,
            batch,
            connection_id,
            RowKey::shared(),
            StateKind::Legacy,
            Some(state),
        ),
        StateWrapper::Global {
            shared_state,
            streams,
        } => {
            plan_write(
                conn,
                batch,
                connection_id,
                RowKey::shared(),
                StateKind::Global,
                shared_state.as_ref(),
            )?;
            for stream in streams {
                plan_write(
                    conn,
                    batch,
                    connection_id,
                    RowKey::for_stream(&stream.descriptor),
                    StateKind::Global,
                    stream.state.as_ref(),
                )?;
            }
            Ok(())
        }
        StateWrapper::Stream { streams } => {
            for stream in streams {
                plan_write(
                    conn,
                    batch,
                    connection_id,
                    RowKey::for_stream(&stream.descriptor),
                    StateKind::Stream,
                    stream.state.as_ref(),
                )?;
            }
            Ok(())
        }
    }
}

fn parse_timestamp(value: &str) -> StateResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StateError::InvalidRow(format!("bad timestamp '{}': {}", value, e)))
}

impl StateStore for SqliteStateStore {
    fn get_current_state(&self, connection_id: Uuid) -> StateResult<Option<StateWrapper>> {
        let conn = self.lock()?;
        current_state(&conn, connection_id)
    }

    fn update_or_create_state(&self, connection_id: Uuid, state: &StateWrapper) -> StateResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous = current_state(&tx, connection_id)?.map(|s| s.kind());
        let next = state.kind();
        let migrating = is_migration(previous, next);

        if let Some(from) = previous {
            if !migrating && from != next {
                return Err(StateError::MigrationNotAllowed { from, to: next });
            }
        }

        let mut batch = StateUpdateBatch::new(connection_id, Utc::now());
        if migrating {
            info!(connection_id = %connection_id, to = %next, "Migrating legacy state");
            plan_write(
                &tx,
                &mut batch,
                connection_id,
                RowKey::shared(),
                StateKind::Legacy,
                None,
            )?;
        }
        plan_state(&tx, &mut batch, connection_id, state)?;

        let summary = batch.flush(&tx)?;
        tx.commit()?;

        debug!(
            connection_id = %connection_id,
            kind = %next,
            updated = summary.updated,
            created = summary.created,
            deleted = summary.deleted,
            "Saved state"
        );
        Ok(())
    }

    fn erase_state(&self, connection_id: Uuid) -> StateResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let deleted = tx.execute(
            "DELETE FROM state WHERE connection_id = ?1",
            [connection_id.to_string()],
        )?;
        tx.commit()?;

        info!(connection_id = %connection_id, deleted, "Erased state");
        Ok(())
    }

    fn bulk_delete(
        &self,
        connection_id: Uuid,
        streams_to_delete: &HashSet<StreamDescriptor>,
    ) -> StateResult<()> {
        if streams_to_delete.is_empty() {
            return Ok(());
        }

        let Some(current) = self.get_current_state(connection_id)? else {
            return Ok(());
        };

        if &current.streams_in_state() == streams_to_delete {
            info!(connection_id = %connection_id, "Every stream in state is deleted, erasing state");
            return self.erase_state(connection_id);
        }

        let known = self.catalog.list_current_streams(connection_id)?;
        if known.is_empty() || &known == streams_to_delete {
            info!(
                connection_id = %connection_id,
                known_streams = known.len(),
                "No configured stream survives, erasing state"
            );
            return self.erase_state(connection_id);
        }

        let keys: Vec<RowKey> = streams_to_delete.iter().map(RowKey::for_stream).collect();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut deleted = 0;
        for chunk in keys.chunks(MAX_KEYS_PER_STATEMENT) {
            deleted += tx.execute(
                &delete_streams_sql(chunk.len()),
                rusqlite::params_from_iter(delete_streams_params(connection_id, chunk)),
            )?;
        }
        tx.commit()?;

        info!(
            connection_id = %connection_id,
            requested = streams_to_delete.len(),
            deleted,
            "Deleted stream states"
        );
        Ok(())
    }

    fn list_connections(&self) -> StateResult<Vec<ConnectionSummary>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT connection_id, GROUP_CONCAT(DISTINCT type), COUNT(*), MAX(updated_at)
             FROM state
             GROUP BY connection_id
             ORDER BY connection_id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (connection_id, kinds, row_count, last_updated) = row?;
            let connection_id = Uuid::parse_str(&connection_id).map_err(|e| {
                StateError::InvalidRow(format!("bad connection id '{}': {}", connection_id, e))
            })?;
            let mut kinds = kinds
                .split(',')
                .map(|k| k.parse::<StateKind>())
                .collect::<Result<Vec<_>, _>>()?;
            kinds.sort();

            result.push(ConnectionSummary {
                connection_id,
                kinds,
                row_count: row_count as usize,
                last_updated: parse_timestamp(&last_updated)?,
            });
        }

        Ok(result)
    }
}
