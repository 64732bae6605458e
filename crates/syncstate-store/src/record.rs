//! Persisted state rows and their reconstruction into a [`StateWrapper`].

use std::collections::BTreeSet;

use serde_json::Value;
use syncstate_core::{decode_payload, StateKind, StateWrapper, StreamDescriptor, StreamState};
use tracing::warn;
use uuid::Uuid;

use crate::error::{StateError, StateResult};

/// Identifies a row within one connection. Both fields `None` is the shared row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RowKey {
    pub stream_name: Option<String>,
    pub namespace: Option<String>,
}

impl RowKey {
    pub fn shared() -> Self {
        Self {
            stream_name: None,
            namespace: None,
        }
    }

    pub fn for_stream(descriptor: &StreamDescriptor) -> Self {
        Self {
            stream_name: Some(descriptor.name.clone()),
            namespace: descriptor.namespace.clone(),
        }
    }

    pub fn is_shared(&self) -> bool {
        self.stream_name.is_none() && self.namespace.is_none()
    }
}

/// A decoded row of the state table.
#[derive(Debug, Clone, PartialEq)]
pub struct StateRecord {
    pub kind: StateKind,
    pub key: RowKey,
    pub state: Value,
}

impl StateRecord {
    /// Decode the raw column values of a row.
    pub fn decode(
        kind: &str,
        stream_name: Option<String>,
        namespace: Option<String>,
        stored: &str,
    ) -> StateResult<Self> {
        let kind: StateKind = kind.parse()?;
        let state = decode_payload(kind, stored)?;
        Ok(Self {
            kind,
            key: RowKey {
                stream_name,
                namespace,
            },
            state,
        })
    }

    fn into_stream_state(self) -> StreamState {
        let descriptor = StreamDescriptor {
            name: self.key.stream_name.unwrap_or_default(),
            namespace: self.key.namespace,
        };
        StreamState::new(descriptor, Some(self.state))
    }
}

/// The single kind shared by every record of a connection.
///
/// `records` must not be empty.
pub fn resolve_kind(connection_id: Uuid, records: &[StateRecord]) -> StateResult<StateKind> {
    let kinds: BTreeSet<StateKind> = records.iter().map(|r| r.kind).collect();
    match kinds.len() {
        1 => Ok(records[0].kind),
        _ => Err(StateError::Inconsistent {
            connection_id,
            kinds,
        }),
    }
}

/// Rebuild the logical state of a connection from its rows.
pub fn build_state(
    connection_id: Uuid,
    records: Vec<StateRecord>,
) -> StateResult<Option<StateWrapper>> {
    if records.is_empty() {
        return Ok(None);
    }

    let wrapper = match resolve_kind(connection_id, &records)? {
        StateKind::Global => build_global_state(connection_id, records),
        StateKind::Stream => StateWrapper::Stream {
            streams: records
                .into_iter()
                .map(StateRecord::into_stream_state)
                .collect(),
        },
        StateKind::Legacy => build_legacy_state(connection_id, records),
    };
    Ok(Some(wrapper))
}

fn build_global_state(connection_id: Uuid, records: Vec<StateRecord>) -> StateWrapper {
    let (shared, per_stream): (Vec<_>, Vec<_>) =
        records.into_iter().partition(|r| r.key.is_shared());

    if shared.len() > 1 {
        warn!(
            connection_id = %connection_id,
            shared_rows = shared.len(),
            "Multiple shared state rows found, using the first one"
        );
    }

    StateWrapper::Global {
        shared_state: shared.into_iter().next().map(|r| r.state),
        streams: per_stream
            .into_iter()
            .map(StateRecord::into_stream_state)
            .collect(),
    }
}

fn build_legacy_state(connection_id: Uuid, records: Vec<StateRecord>) -> StateWrapper {
    if records.len() > 1 {
        warn!(
            connection_id = %connection_id,
            rows = records.len(),
            "Multiple legacy state rows found, using the first one"
        );
    }

    let state = records
        .into_iter()
        .next()
        .map(|r| r.state)
        .unwrap_or(Value::Null);
    StateWrapper::Legacy { state }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(kind: StateKind, name: Option<&str>, ns: Option<&str>, state: Value) -> StateRecord {
        StateRecord {
            kind,
            key: RowKey {
                stream_name: name.map(String::from),
                namespace: ns.map(String::from),
            },
            state,
        }
    }

    #[test]
    fn test_no_records_is_absent() {
        assert!(build_state(Uuid::new_v4(), vec![]).unwrap().is_none());
    }

    #[test]
    fn test_mixed_kinds_are_inconsistent() {
        let connection_id = Uuid::new_v4();
        let records = vec![
            record(StateKind::Stream, Some("a"), None, json!(1)),
            record(StateKind::Global, None, None, json!({})),
        ];
        match build_state(connection_id, records) {
            Err(StateError::Inconsistent { connection_id: id, kinds }) => {
                assert_eq!(id, connection_id);
                assert!(kinds.contains(&StateKind::Stream));
                assert!(kinds.contains(&StateKind::Global));
            }
            other => panic!("expected inconsistency, got {:?}", other),
        }
    }

    #[test]
    fn test_global_partitions_shared_row() {
        let records = vec![
            record(StateKind::Global, Some("a"), None, json!(1)),
            record(StateKind::Global, None, None, json!({"lsn": 9})),
            record(StateKind::Global, Some("b"), Some("ns"), json!(2)),
        ];
        let wrapper = build_state(Uuid::new_v4(), records).unwrap().unwrap();
        match wrapper {
            StateWrapper::Global { shared_state, streams } => {
                assert_eq!(shared_state, Some(json!({"lsn": 9})));
                assert_eq!(streams.len(), 2);
                assert_eq!(streams[0].descriptor, StreamDescriptor::new("a"));
                assert_eq!(streams[1].state, Some(json!(2)));
            }
            other => panic!("expected global state, got {:?}", other),
        }
    }

    #[test]
    fn test_global_without_shared_row() {
        let records = vec![record(StateKind::Global, Some("a"), None, json!(1))];
        let wrapper = build_state(Uuid::new_v4(), records).unwrap().unwrap();
        assert!(matches!(
            wrapper,
            StateWrapper::Global { shared_state: None, .. }
        ));
    }

    #[test]
    fn test_global_takes_first_of_many_shared_rows() {
        let records = vec![
            record(StateKind::Global, None, None, json!("first")),
            record(StateKind::Global, None, None, json!("second")),
        ];
        let wrapper = build_state(Uuid::new_v4(), records).unwrap().unwrap();
        assert!(matches!(
            wrapper,
            StateWrapper::Global { shared_state: Some(ref s), .. } if s == &json!("first")
        ));
    }

    #[test]
    fn test_legacy_single_row() {
        let records = vec![record(StateKind::Legacy, None, None, json!({"cursor": 1}))];
        let wrapper = build_state(Uuid::new_v4(), records).unwrap().unwrap();
        assert_eq!(wrapper, StateWrapper::Legacy { state: json!({"cursor": 1}) });
    }

    #[test]
    fn test_decode_unwraps_legacy_envelope() {
        let rec = StateRecord::decode("legacy", None, None, r#"{"state":{"cursor":5}}"#).unwrap();
        assert_eq!(rec.kind, StateKind::Legacy);
        assert!(rec.key.is_shared());
        assert_eq!(rec.state, json!({"cursor": 5}));

        let rec = StateRecord::decode("stream", Some("a".into()), None, r#"{"cursor":5}"#).unwrap();
        assert_eq!(rec.state, json!({"cursor": 5}));
    }

    #[test]
    fn test_decode_unknown_kind() {
        let result = StateRecord::decode("per_stream", None, None, "{}");
        assert!(matches!(result, Err(StateError::Core(_))));
    }

    #[test]
    fn test_row_key() {
        assert!(RowKey::shared().is_shared());
        let key = RowKey::for_stream(&StreamDescriptor::new("a"));
        assert!(!key.is_shared());
        assert_eq!(key.namespace, None);
    }
}
