//! The known-streams oracle: the authoritative set of streams a connection
//! currently syncs.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock};

use rusqlite::{params, Connection};
use syncstate_core::StreamDescriptor;
use tracing::info;
use uuid::Uuid;

use crate::error::{StateError, StateResult};
use crate::schema::ensure_catalog_schema;

/// Lookup of the streams currently configured for a connection.
pub trait StreamCatalog: Send + Sync {
    /// Unknown connections yield an empty set, not an error.
    fn list_current_streams(&self, connection_id: Uuid) -> StateResult<HashSet<StreamDescriptor>>;
}

/// In-memory catalog.
#[derive(Debug, Default)]
pub struct StaticStreamCatalog {
    streams: RwLock<HashMap<Uuid, HashSet<StreamDescriptor>>>,
}

impl StaticStreamCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the streams of a connection.
    pub fn set_streams(
        &self,
        connection_id: Uuid,
        streams: impl IntoIterator<Item = StreamDescriptor>,
    ) -> StateResult<()> {
        let mut map = self.streams.write().map_err(|_| StateError::LockPoisoned)?;
        map.insert(connection_id, streams.into_iter().collect());
        Ok(())
    }

    /// Forget a connection entirely.
    pub fn remove_connection(&self, connection_id: Uuid) -> StateResult<()> {
        let mut map = self.streams.write().map_err(|_| StateError::LockPoisoned)?;
        map.remove(&connection_id);
        Ok(())
    }
}

impl StreamCatalog for StaticStreamCatalog {
    fn list_current_streams(&self, connection_id: Uuid) -> StateResult<HashSet<StreamDescriptor>> {
        let map = self.streams.read().map_err(|_| StateError::LockPoisoned)?;
        Ok(map.get(&connection_id).cloned().unwrap_or_default())
    }
}

/// Catalog kept in the `connection_stream` table of a SQLite database.
pub struct SqliteStreamCatalog {
    conn: Mutex<Connection>,
}

impl SqliteStreamCatalog {
    /// Open or create a catalog at the given path.
    pub fn open(path: impl AsRef<Path>) -> StateResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Opening stream catalog");
        Self::init(Connection::open(path)?)
    }

    /// Create an in-memory catalog (for testing).
    pub fn in_memory() -> StateResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StateResult<Self> {
        ensure_catalog_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StateResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StateError::LockPoisoned)
    }

    /// Add streams to a connection. Already registered streams are left as is.
    pub fn register_streams(
        &self,
        connection_id: Uuid,
        streams: &[StreamDescriptor],
    ) -> StateResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let connection_id = connection_id.to_string();
        let mut added = 0;
        {
            let mut exists = tx.prepare(
                "SELECT COUNT(*) FROM connection_stream
                 WHERE connection_id = ?1 AND stream_name = ?2 AND namespace IS ?3",
            )?;
            let mut insert = tx.prepare(
                "INSERT INTO connection_stream (connection_id, stream_name, namespace)
                 VALUES (?1, ?2, ?3)",
            )?;
            for stream in streams {
                let count: i64 = exists.query_row(
                    params![connection_id, stream.name, stream.namespace],
                    |row| row.get(0),
                )?;
                if count == 0 {
                    added += insert.execute(params![connection_id, stream.name, stream.namespace])?;
                }
            }
        }
        tx.commit()?;
        Ok(added)
    }

    /// Remove streams from a connection.
    pub fn remove_streams(
        &self,
        connection_id: Uuid,
        streams: &[StreamDescriptor],
    ) -> StateResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let connection_id = connection_id.to_string();
        let mut removed = 0;
        {
            let mut delete = tx.prepare(
                "DELETE FROM connection_stream
                 WHERE connection_id = ?1 AND stream_name = ?2 AND namespace IS ?3",
            )?;
            for stream in streams {
                removed += delete.execute(params![connection_id, stream.name, stream.namespace])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }
}

impl StreamCatalog for SqliteStreamCatalog {
    fn list_current_streams(&self, connection_id: Uuid) -> StateResult<HashSet<StreamDescriptor>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT stream_name, namespace FROM connection_stream WHERE connection_id = ?1",
        )?;

        let rows = stmt.query_map([connection_id.to_string()], |row| {
            Ok(StreamDescriptor {
                name: row.get(0)?,
                namespace: row.get(1)?,
            })
        })?;

        let mut result = HashSet::new();
        for row in rows {
            result.insert(row?);
        }

        Ok(result)
    }
}
