//! Checkpoint messages as emitted by source connectors, and their
//! classification into a [`StateWrapper`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::{StateWrapper, StreamDescriptor, StreamState};

/// The `type` field of a state message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StateMessageType {
    Global,
    Stream,
    Legacy,
}

/// State of one stream inside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamStateMessage {
    pub stream_descriptor: StreamDescriptor,
    #[serde(default)]
    pub stream_state: Option<Value>,
}

/// Shared state plus the per-stream states of a global checkpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStateMessage {
    #[serde(default)]
    pub shared_state: Option<Value>,
    #[serde(default)]
    pub stream_states: Vec<StreamStateMessage>,
}

/// A single state message. Which member is set depends on `message_type`;
/// untyped messages are legacy blobs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMessage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub message_type: Option<StateMessageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<StreamStateMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global: Option<GlobalStateMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl StateMessage {
    pub fn stream(stream: StreamStateMessage) -> Self {
        Self {
            message_type: Some(StateMessageType::Stream),
            stream: Some(stream),
            ..Default::default()
        }
    }

    pub fn global(global: GlobalStateMessage) -> Self {
        Self {
            message_type: Some(StateMessageType::Global),
            global: Some(global),
            ..Default::default()
        }
    }
}

impl From<StreamStateMessage> for StreamState {
    fn from(msg: StreamStateMessage) -> Self {
        StreamState::new(msg.stream_descriptor, msg.stream_state)
    }
}

impl From<&StreamState> for StreamStateMessage {
    fn from(state: &StreamState) -> Self {
        StreamStateMessage {
            stream_descriptor: state.descriptor.clone(),
            stream_state: state.state.clone(),
        }
    }
}

/// Classify a raw checkpoint blob.
///
/// Returns `None` for a null blob or an empty message list. A blob that is not
/// a list of state messages is treated as a legacy state.
pub fn typed_state(blob: Option<&Value>) -> Result<Option<StateWrapper>> {
    let Some(blob) = blob.filter(|b| !b.is_null()) else {
        return Ok(None);
    };

    let messages: Vec<StateMessage> = match serde_json::from_value(blob.clone()) {
        Ok(messages) => messages,
        Err(_) => return Ok(Some(StateWrapper::Legacy { state: blob.clone() })),
    };

    match messages.as_slice() {
        [] => Ok(None),
        [single] => match single.message_type {
            None => Ok(Some(StateWrapper::Legacy { state: blob.clone() })),
            Some(StateMessageType::Legacy) => Ok(Some(StateWrapper::Legacy {
                state: single.data.clone().unwrap_or(Value::Null),
            })),
            Some(StateMessageType::Global) => {
                let global = single.global.clone().ok_or_else(|| {
                    Error::MalformedMessage("GLOBAL message without a 'global' member".into())
                })?;
                Ok(Some(StateWrapper::Global {
                    shared_state: global.shared_state,
                    streams: global.stream_states.into_iter().map(Into::into).collect(),
                }))
            }
            Some(StateMessageType::Stream) => Ok(Some(StateWrapper::Stream {
                streams: vec![stream_member(single)?],
            })),
        },
        many => {
            if many
                .iter()
                .all(|m| m.message_type == Some(StateMessageType::Stream))
            {
                let streams = many.iter().map(stream_member).collect::<Result<Vec<_>>>()?;
                Ok(Some(StateWrapper::Stream { streams }))
            } else {
                Err(Error::AmbiguousState(
                    "the state contains either multiple global or conflicting state types".into(),
                ))
            }
        }
    }
}

fn stream_member(msg: &StateMessage) -> Result<StreamState> {
    msg.stream
        .clone()
        .map(Into::into)
        .ok_or_else(|| Error::MalformedMessage("STREAM message without a 'stream' member".into()))
}

/// Render a wrapper as the checkpoint blob a connector expects.
pub fn to_state_blob(wrapper: &StateWrapper) -> Result<Value> {
    let blob = match wrapper {
        StateWrapper::Legacy { state } => state.clone(),
        StateWrapper::Stream { streams } => {
            let messages: Vec<StateMessage> = streams
                .iter()
                .map(|s| StateMessage::stream(s.into()))
                .collect();
            serde_json::to_value(messages)?
        }
        StateWrapper::Global {
            shared_state,
            streams,
        } => {
            let message = StateMessage::global(GlobalStateMessage {
                shared_state: shared_state.clone(),
                stream_states: streams.iter().map(Into::into).collect(),
            });
            serde_json::to_value(vec![message])?
        }
    };
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StateKind;
    use serde_json::json;

    #[test]
    fn test_null_and_empty_are_absent() {
        assert!(typed_state(None).unwrap().is_none());
        assert!(typed_state(Some(&Value::Null)).unwrap().is_none());
        assert!(typed_state(Some(&json!([]))).unwrap().is_none());
    }

    #[test]
    fn test_plain_object_is_legacy() {
        let blob = json!({"cdc": false, "streams": []});
        let wrapper = typed_state(Some(&blob)).unwrap().unwrap();
        assert_eq!(wrapper, StateWrapper::Legacy { state: blob });
    }

    #[test]
    fn test_untyped_single_message_is_legacy() {
        let blob = json!([{"cursor": 1}]);
        let wrapper = typed_state(Some(&blob)).unwrap().unwrap();
        assert_eq!(wrapper, StateWrapper::Legacy { state: blob });
    }

    #[test]
    fn test_typed_legacy_unwraps_data() {
        let blob = json!([{"type": "LEGACY", "data": {"cursor": 7}}]);
        let wrapper = typed_state(Some(&blob)).unwrap().unwrap();
        assert_eq!(wrapper, StateWrapper::Legacy { state: json!({"cursor": 7}) });
    }

    #[test]
    fn test_global_message() {
        let blob = json!([{
            "type": "GLOBAL",
            "global": {
                "shared_state": {"lsn": 100},
                "stream_states": [
                    {"stream_descriptor": {"name": "a"}, "stream_state": {"c": 1}},
                    {"stream_descriptor": {"name": "b", "namespace": "ns"}, "stream_state": null}
                ]
            }
        }]);
        let wrapper = typed_state(Some(&blob)).unwrap().unwrap();
        assert_eq!(wrapper.kind(), StateKind::Global);
        match wrapper {
            StateWrapper::Global { shared_state, streams } => {
                assert_eq!(shared_state, Some(json!({"lsn": 100})));
                assert_eq!(streams.len(), 2);
                assert_eq!(streams[1].descriptor, StreamDescriptor::new("b").with_namespace("ns"));
                assert!(streams[1].state.is_none());
            }
            other => panic!("expected global state, got {:?}", other),
        }
    }

    #[test]
    fn test_multiple_stream_messages() {
        let blob = json!([
            {"type": "STREAM", "stream": {"stream_descriptor": {"name": "a"}, "stream_state": 1}},
            {"type": "STREAM", "stream": {"stream_descriptor": {"name": "b"}, "stream_state": 2}}
        ]);
        let wrapper = typed_state(Some(&blob)).unwrap().unwrap();
        assert_eq!(wrapper.kind(), StateKind::Stream);
        assert_eq!(wrapper.stream_states().len(), 2);
    }

    #[test]
    fn test_conflicting_types_are_rejected() {
        let blob = json!([
            {"type": "STREAM", "stream": {"stream_descriptor": {"name": "a"}}},
            {"type": "GLOBAL", "global": {"shared_state": 1}}
        ]);
        assert!(matches!(typed_state(Some(&blob)), Err(Error::AmbiguousState(_))));

        let two_globals = json!([
            {"type": "GLOBAL", "global": {}},
            {"type": "GLOBAL", "global": {}}
        ]);
        assert!(matches!(typed_state(Some(&two_globals)), Err(Error::AmbiguousState(_))));
    }

    #[test]
    fn test_stream_message_without_member() {
        let blob = json!([{"type": "STREAM"}]);
        assert!(matches!(typed_state(Some(&blob)), Err(Error::MalformedMessage(_))));
    }

    #[test]
    fn test_state_blob_reclassifies_to_same_wrapper() {
        let global = StateWrapper::Global {
            shared_state: Some(json!({"lsn": 5})),
            streams: vec![StreamState::new(StreamDescriptor::new("a"), Some(json!(1)))],
        };
        let blob = to_state_blob(&global).unwrap();
        assert_eq!(blob[0]["type"], json!("GLOBAL"));
        assert_eq!(typed_state(Some(&blob)).unwrap(), Some(global));

        let legacy = StateWrapper::Legacy { state: json!({"x": 1}) };
        assert_eq!(to_state_blob(&legacy).unwrap(), json!({"x": 1}));
    }
}
