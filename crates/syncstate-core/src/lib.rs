pub mod codec;
pub mod error;
pub mod message;
pub mod types;

pub use codec::{decode_payload, encode_payload, writable_payload};
pub use error::{Error, Result};
pub use message::{
    to_state_blob, typed_state, GlobalStateMessage, StateMessage, StateMessageType,
    StreamStateMessage,
};
pub use types::{StateKind, StateWrapper, StreamDescriptor, StreamState};
