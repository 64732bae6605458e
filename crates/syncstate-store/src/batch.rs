use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Transaction};
use serde_json::Value;
use syncstate_core::{encode_payload, writable_payload, StateKind};
use uuid::Uuid;

use crate::error::StateResult;
use crate::record::RowKey;

/// A row to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedCreate {
    pub id: Uuid,
    pub key: RowKey,
    pub kind: StateKind,
    pub state: String,
}

/// A row to overwrite in place.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedUpdate {
    pub key: RowKey,
    pub kind: StateKind,
    pub state: String,
}

/// Row counts affected by a flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub updated: usize,
    pub created: usize,
    pub deleted: usize,
}

/// The row mutations planned for one connection within one transaction.
///
/// Holds at most one mutation per row key: planning a key again replaces the
/// earlier plan. A state listing the same stream twice therefore keeps its
/// last entry, even when an earlier entry was a null payload. Flushing runs
/// updates, then creates, then deletes.
#[derive(Debug)]
pub struct StateUpdateBatch {
    connection_id: Uuid,
    written_at: DateTime<Utc>,
    to_update: Vec<PlannedUpdate>,
    to_create: Vec<PlannedCreate>,
    to_delete: Vec<RowKey>,
}

impl StateUpdateBatch {
    pub fn new(connection_id: Uuid, written_at: DateTime<Utc>) -> Self {
        Self {
            connection_id,
            written_at,
            to_update: Vec::new(),
            to_create: Vec::new(),
            to_delete: Vec::new(),
        }
    }

    /// Plan the write of one row.
    ///
    /// A missing or null payload deletes the row; otherwise the row is updated
    /// when `exists`, created when not.
    pub fn plan(
        &mut self,
        key: RowKey,
        kind: StateKind,
        payload: Option<&Value>,
        exists: bool,
    ) -> StateResult<()> {
        self.forget(&key);

        match writable_payload(payload) {
            None => self.to_delete.push(key),
            Some(payload) => {
                let state = encode_payload(kind, payload)?;
                if exists {
                    self.to_update.push(PlannedUpdate { key, kind, state });
                } else {
                    self.to_create.push(PlannedCreate {
                        id: Uuid::new_v4(),
                        key,
                        kind,
                        state,
                    });
                }
            }
        }
        Ok(())
    }

    fn forget(&mut self, key: &RowKey) {
        self.to_update.retain(|u| &u.key != key);
        self.to_create.retain(|c| &c.key != key);
        self.to_delete.retain(|d| d != key);
    }

    pub fn to_update(&self) -> &[PlannedUpdate] {
        &self.to_update
    }

    pub fn to_create(&self) -> &[PlannedCreate] {
        &self.to_create
    }

    pub fn to_delete(&self) -> &[RowKey] {
        &self.to_delete
    }

    pub fn len(&self) -> usize {
        self.to_update.len() + self.to_create.len() + self.to_delete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Execute the planned mutations inside `tx`.
    pub fn flush(self, tx: &Transaction<'_>) -> StateResult<FlushSummary> {
        let connection_id = self.connection_id.to_string();
        let now = self.written_at.to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut summary = FlushSummary::default();

        if !self.to_update.is_empty() {
            let mut stmt = tx.prepare(
                "UPDATE state SET state = ?1, type = ?2, updated_at = ?3
                 WHERE connection_id = ?4 AND stream_name IS ?5 AND namespace IS ?6",
            )?;
            for update in &self.to_update {
                summary.updated += stmt.execute(params![
                    update.state,
                    update.kind.as_str(),
                    now,
                    connection_id,
                    update.key.stream_name,
                    update.key.namespace,
                ])?;
            }
        }

        if !self.to_create.is_empty() {
            let mut stmt = tx.prepare(
                "INSERT INTO state (id, connection_id, stream_name, namespace, type, state, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)",
            )?;
            for create in &self.to_create {
                summary.created += stmt.execute(params![
                    create.id.to_string(),
                    connection_id,
                    create.key.stream_name,
                    create.key.namespace,
                    create.kind.as_str(),
                    create.state,
                    now,
                ])?;
            }
        }

        if !self.to_delete.is_empty() {
            let mut stmt = tx.prepare(
                "DELETE FROM state
                 WHERE connection_id = ?1 AND stream_name IS ?2 AND namespace IS ?3",
            )?;
            for key in &self.to_delete {
                summary.deleted += stmt.execute(params![connection_id, key.stream_name, key.namespace])?;
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ensure_state_schema;
    use rusqlite::Connection;
    use serde_json::json;
    use syncstate_core::StreamDescriptor;

    fn stream_key(name: &str) -> RowKey {
        RowKey::for_stream(&StreamDescriptor::new(name))
    }

    fn batch() -> StateUpdateBatch {
        StateUpdateBatch::new(Uuid::new_v4(), Utc::now())
    }

    #[test]
    fn test_plan_sorts_into_lists() {
        let mut batch = batch();
        batch
            .plan(stream_key("a"), StateKind::Stream, Some(&json!(1)), true)
            .unwrap();
        batch
            .plan(stream_key("b"), StateKind::Stream, Some(&json!(2)), false)
            .unwrap();
        batch
            .plan(stream_key("c"), StateKind::Stream, None, true)
            .unwrap();

        assert_eq!(batch.to_update().len(), 1);
        assert_eq!(batch.to_update()[0].key, stream_key("a"));
        assert_eq!(batch.to_create().len(), 1);
        assert_eq!(batch.to_create()[0].state, "2");
        assert_eq!(batch.to_delete(), &[stream_key("c")]);
        assert_eq!(batch.len(), 3);
    }

    #[test]
    fn test_json_null_is_a_delete() {
        let mut batch = batch();
        batch
            .plan(stream_key("a"), StateKind::Stream, Some(&Value::Null), false)
            .unwrap();
        assert!(batch.to_create().is_empty());
        assert_eq!(batch.to_delete().len(), 1);
    }

    #[test]
    fn test_legacy_payload_is_enveloped() {
        let mut batch = batch();
        batch
            .plan(RowKey::shared(), StateKind::Legacy, Some(&json!({"c": 1})), false)
            .unwrap();
        assert_eq!(batch.to_create()[0].state, r#"{"state":{"c":1}}"#);
    }

    #[test]
    fn test_replanning_a_key_replaces_it() {
        let mut batch = batch();
        batch
            .plan(RowKey::shared(), StateKind::Legacy, None, true)
            .unwrap();
        batch
            .plan(RowKey::shared(), StateKind::Global, Some(&json!({"lsn": 1})), true)
            .unwrap();

        assert!(batch.to_delete().is_empty());
        assert_eq!(batch.to_update().len(), 1);
        assert_eq!(batch.to_update()[0].kind, StateKind::Global);
    }

    #[test]
    fn test_last_plan_for_a_stream_wins() {
        let mut batch = batch();
        batch
            .plan(stream_key("a"), StateKind::Stream, None, true)
            .unwrap();
        batch
            .plan(stream_key("a"), StateKind::Stream, Some(&json!(2)), true)
            .unwrap();

        assert!(batch.to_delete().is_empty());
        assert_eq!(batch.to_update().len(), 1);
        assert_eq!(batch.to_update()[0].state, "2");
    }

    #[test]
    fn test_flush_runs_updates_then_creates_then_deletes() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_state_schema(&conn).unwrap();
        let connection_id = Uuid::new_v4();

        for name in ["updated", "deleted"] {
            conn.execute(
                "INSERT INTO state (id, connection_id, stream_name, type, state, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 'stream', '1', 'then', 'then')",
                params![Uuid::new_v4().to_string(), connection_id.to_string(), name],
            )
            .unwrap();
        }
        conn.execute_batch(
            "CREATE TABLE flush_log (seq INTEGER PRIMARY KEY AUTOINCREMENT, op TEXT NOT NULL);
             CREATE TRIGGER log_update AFTER UPDATE ON state
                 BEGIN INSERT INTO flush_log (op) VALUES ('update'); END;
             CREATE TRIGGER log_insert AFTER INSERT ON state
                 BEGIN INSERT INTO flush_log (op) VALUES ('create'); END;
             CREATE TRIGGER log_delete AFTER DELETE ON state
                 BEGIN INSERT INTO flush_log (op) VALUES ('delete'); END;",
        )
        .unwrap();

        let tx = conn.transaction().unwrap();
        let mut batch = StateUpdateBatch::new(connection_id, Utc::now());
        batch
            .plan(stream_key("deleted"), StateKind::Stream, None, true)
            .unwrap();
        batch
            .plan(stream_key("created"), StateKind::Stream, Some(&json!(2)), false)
            .unwrap();
        batch
            .plan(stream_key("updated"), StateKind::Stream, Some(&json!(3)), true)
            .unwrap();
        batch.flush(&tx).unwrap();
        tx.commit().unwrap();

        let log: Vec<String> = conn
            .prepare("SELECT op FROM flush_log ORDER BY seq")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(log, vec!["update", "create", "delete"]);
    }

    #[test]
    fn test_flush_applies_all_mutations() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_state_schema(&conn).unwrap();
        let connection_id = Uuid::new_v4();

        let tx = conn.transaction().unwrap();
        let mut first = StateUpdateBatch::new(connection_id, Utc::now());
        first
            .plan(stream_key("a"), StateKind::Stream, Some(&json!(1)), false)
            .unwrap();
        first
            .plan(stream_key("b"), StateKind::Stream, Some(&json!(2)), false)
            .unwrap();
        let summary = first.flush(&tx).unwrap();
        assert_eq!(summary.created, 2);

        let mut second = StateUpdateBatch::new(connection_id, Utc::now());
        second
            .plan(stream_key("a"), StateKind::Stream, Some(&json!(10)), true)
            .unwrap();
        second
            .plan(stream_key("b"), StateKind::Stream, None, true)
            .unwrap();
        let summary = second.flush(&tx).unwrap();
        assert_eq!(
            summary,
            FlushSummary {
                updated: 1,
                created: 0,
                deleted: 1
            }
        );
        tx.commit().unwrap();

        let rows: Vec<(String, String)> = conn
            .prepare("SELECT stream_name, state FROM state")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows, vec![("a".to_string(), "10".to_string())]);
    }

    #[test]
    fn test_flush_sets_timestamps() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_state_schema(&conn).unwrap();
        let written_at = Utc::now();

        let tx = conn.transaction().unwrap();
        let mut batch = StateUpdateBatch::new(Uuid::new_v4(), written_at);
        batch
            .plan(stream_key("a"), StateKind::Stream, Some(&json!(1)), false)
            .unwrap();
        batch.flush(&tx).unwrap();

        let (created_at, updated_at): (String, String) = tx
            .query_row("SELECT created_at, updated_at FROM state", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();
        assert_eq!(created_at, updated_at);
        assert_eq!(
            created_at,
            written_at.to_rfc3339_opts(SecondsFormat::Micros, true)
        );
    }
}
