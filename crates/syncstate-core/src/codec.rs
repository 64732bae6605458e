//! Conversion between checkpoint payloads and the JSON stored in a state row.
//!
//! Legacy payloads are stored inside a `{"state": ...}` envelope, which is
//! how historical rows were written. Global and stream payloads are stored raw.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::StateKind;

#[derive(Debug, Serialize, Deserialize)]
struct LegacyEnvelope {
    #[serde(default)]
    state: Value,
}

/// Serialize a payload for the `state` column.
pub fn encode_payload(kind: StateKind, payload: &Value) -> Result<String> {
    let encoded = match kind {
        StateKind::Legacy => serde_json::to_string(&LegacyEnvelope {
            state: payload.clone(),
        })?,
        StateKind::Global | StateKind::Stream => serde_json::to_string(payload)?,
    };
    Ok(encoded)
}

/// Parse the `state` column back into the payload.
pub fn decode_payload(kind: StateKind, stored: &str) -> Result<Value> {
    match kind {
        StateKind::Legacy => {
            let envelope: LegacyEnvelope = serde_json::from_str(stored)?;
            Ok(envelope.state)
        }
        StateKind::Global | StateKind::Stream => Ok(serde_json::from_str(stored)?),
    }
}

/// Returns the payload to write, or `None` when the row should be deleted.
/// JSON `null` counts as absent.
pub fn writable_payload(payload: Option<&Value>) -> Option<&Value> {
    payload.filter(|v| !v.is_null())
}
