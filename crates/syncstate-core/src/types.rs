use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Error;

/// Identifies one replicated stream of a connection.
///
/// A `None` namespace is its own value: it never equals `Some("")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl StreamDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

impl fmt::Display for StreamDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}.{}", ns, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// The structural representation of a connection's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateKind {
    /// A single opaque blob.
    Legacy,
    /// One shared cursor plus per-stream sub-states.
    Global,
    /// Independent per-stream cursors.
    Stream,
}

impl StateKind {
    /// The literal stored in the `type` column.
    pub fn as_str(self) -> &'static str {
        match self {
            StateKind::Legacy => "legacy",
            StateKind::Global => "global",
            StateKind::Stream => "stream",
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(StateKind::Legacy),
            "global" => Ok(StateKind::Global),
            "stream" => Ok(StateKind::Stream),
            _ => Err(Error::InvalidStateKind(s.to_string())),
        }
    }
}

/// The checkpoint of a single stream. A `None` state means "delete this row".
#[derive(Debug, Clone, PartialEq)]
pub struct StreamState {
    pub descriptor: StreamDescriptor,
    pub state: Option<Value>,
}

impl StreamState {
    pub fn new(descriptor: StreamDescriptor, state: Option<Value>) -> Self {
        Self { descriptor, state }
    }
}

/// The logical state of a connection, as handed to and returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StateWrapper {
    Legacy {
        state: Value,
    },
    Global {
        shared_state: Option<Value>,
        streams: Vec<StreamState>,
    },
    Stream {
        streams: Vec<StreamState>,
    },
}

impl StateWrapper {
    pub fn kind(&self) -> StateKind {
        match self {
            StateWrapper::Legacy { .. } => StateKind::Legacy,
            StateWrapper::Global { .. } => StateKind::Global,
            StateWrapper::Stream { .. } => StateKind::Stream,
        }
    }

    /// Per-stream states. Always empty for legacy state.
    pub fn stream_states(&self) -> &[StreamState] {
        match self {
            StateWrapper::Legacy { .. } => &[],
            StateWrapper::Global { streams, .. } | StateWrapper::Stream { streams } => streams,
        }
    }

    /// The set of streams that have a per-stream entry.
    pub fn streams_in_state(&self) -> HashSet<StreamDescriptor> {
        self.stream_states()
            .iter()
            .map(|s| s.descriptor.clone())
            .collect()
    }

    /// Sort per-stream states by descriptor, so two wrappers built from the
    /// same rows in a different order compare equal.
    pub fn sorted(mut self) -> Self {
        match &mut self {
            StateWrapper::Legacy { .. } => {}
            StateWrapper::Global { streams, .. } | StateWrapper::Stream { streams } => {
                streams.sort_by(|a, b| a.descriptor.cmp(&b.descriptor));
            }
        }
        self
    }
}
