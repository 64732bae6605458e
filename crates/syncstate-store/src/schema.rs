use rusqlite::Connection;
use tracing::debug;

use crate::error::StateResult;

// SQLite treats NULLs as distinct in unique indexes, so the index only
// guards fully named streams; shared rows are kept unique by the
// existence check in front of every insert.
const STATE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS state (
    id TEXT PRIMARY KEY,
    connection_id TEXT NOT NULL,
    stream_name TEXT,
    namespace TEXT,
    type TEXT NOT NULL CHECK (type IN ('legacy', 'global', 'stream')),
    state TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS state__connection_id__stream_name__namespace
    ON state (connection_id, stream_name, namespace);
"#;

const CATALOG_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS connection_stream (
    connection_id TEXT NOT NULL,
    stream_name TEXT NOT NULL,
    namespace TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS connection_stream__connection_id
    ON connection_stream (connection_id);
"#;

/// Create the state table if it doesn't exist.
pub fn ensure_state_schema(conn: &Connection) -> StateResult<()> {
    debug!("Ensuring state schema exists");
    conn.execute_batch(STATE_SCHEMA)?;
    Ok(())
}

/// Create the known-streams catalog table if it doesn't exist.
pub fn ensure_catalog_schema(conn: &Connection) -> StateResult<()> {
    debug!("Ensuring stream catalog schema exists");
    conn.execute_batch(CATALOG_SCHEMA)?;
    Ok(())
}
