//! Wire decoding for inbound command datagrams.
//!
//! A command is a UTF-8 JSON object whose `type` field names the message kind, e.g.
//!
//! ```text
//! {"type": "gait", "mode": "ripple", "translate_y_mm_s": 40}
//! ```
//!
//! Decoding only checks the envelope. Each kind's handler interprets the rest of the body.
pub mod gait;

use alloc::string::String;

use serde_json::Value;
use thiserror::Error;

pub use gait::{GaitMessage, GaitMode};

/// Field holding the message kind.
pub const KIND_FIELD: &str = "type";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a JSON document: {0}")]
    Malformed(serde_json::Error),
    #[error("top level is not an object")]
    NotAnObject,
    #[error("missing `type` discriminator")]
    MissingKind,
}

/// A decoded command, alive for one dispatch cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    kind: String,
    body: Value,
}

impl InboundMessage {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let body: Value = serde_json::from_slice(bytes).map_err(DecodeError::Malformed)?;
        let object = body.as_object().ok_or(DecodeError::NotAnObject)?;
        let kind = object
            .get(KIND_FIELD)
            .and_then(Value::as_str)
            .ok_or(DecodeError::MissingKind)?
            .into();
        Ok(Self { kind, body })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn body(&self) -> &Value {
        &self.body
    }
}
