//! SQL conditions over state rows.
//!
//! Stream keys are compared with SQLite's `IS`, which treats two NULLs as
//! equal. `=` would never match a NULL namespace.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::StateResult;
use crate::record::RowKey;

/// Maximum number of stream keys matched by a single statement.
pub const MAX_KEYS_PER_STATEMENT: usize = 200;

/// `(stream_name IS ?n AND namespace IS ?n+1)`
pub fn stream_key_clause(first_param: usize) -> String {
    format!(
        "(stream_name IS ?{} AND namespace IS ?{})",
        first_param,
        first_param + 1
    )
}

/// Disjunction of `count` stream key clauses, numbering parameters from `first_param`.
pub fn any_stream_key_clause(count: usize, first_param: usize) -> String {
    (0..count)
        .map(|i| stream_key_clause(first_param + 2 * i))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Delete statement for `count` stream keys of one connection. The
/// connection id is bound as `?1`.
pub fn delete_streams_sql(count: usize) -> String {
    format!(
        "DELETE FROM state WHERE connection_id = ?1 AND ({})",
        any_stream_key_clause(count, 2)
    )
}

/// Parameters for [`delete_streams_sql`].
pub fn delete_streams_params(connection_id: Uuid, keys: &[RowKey]) -> Vec<SqlValue> {
    let mut values = Vec::with_capacity(1 + keys.len() * 2);
    values.push(SqlValue::Text(connection_id.to_string()));
    for key in keys {
        values.push(optional_text(&key.stream_name));
        values.push(optional_text(&key.namespace));
    }
    values
}

fn optional_text(value: &Option<String>) -> SqlValue {
    match value {
        Some(s) => SqlValue::Text(s.clone()),
        None => SqlValue::Null,
    }
}

/// Whether a row exists for the given connection and key.
pub fn row_exists(conn: &Connection, connection_id: Uuid, key: &RowKey) -> StateResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM state
             WHERE connection_id = ?1 AND stream_name IS ?2 AND namespace IS ?3
             LIMIT 1",
            params![connection_id.to_string(), key.stream_name, key.namespace],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}
