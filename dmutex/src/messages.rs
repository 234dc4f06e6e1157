//! Wire encoding: one JSON object per datagram.

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::core::{Message, MessageKind, ProcessId, Timestamp};
use crate::error::CodecError;

/// Largest datagram a process reads or writes.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// Decoding view with `Type` as a plain string, so an unknown kind is told
/// apart from a malformed payload.
#[derive(Deserialize)]
struct WireMessage {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "From")]
    from: ProcessId,
    #[serde(rename = "Clock")]
    clock: Timestamp,
    #[serde(rename = "Text", default)]
    text: Option<String>,
}

impl MessageKind {
    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "REQUEST" => Some(Self::Request),
            "REPLY" => Some(Self::Reply),
            "CS" => Some(Self::CriticalSection),
            _ => None,
        }
    }
}

impl Message {
    /// Encode as a single datagram payload.
    pub fn encode(&self) -> Result<Vec<u8>, Report<CodecError>> {
        let bytes = serde_json::to_vec(self).change_context(CodecError::Malformed)?;
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(Report::new(CodecError::Oversized(bytes.len())));
        }
        Ok(bytes)
    }

    /// Decode a datagram payload.
    pub fn decode(bytes: &[u8]) -> Result<Self, Report<CodecError>> {
        let wire: WireMessage = serde_json::from_slice(bytes).map_err(|e| {
            Report::new(e)
                .change_context(CodecError::Malformed)
                .attach(format!("payload: {}", String::from_utf8_lossy(bytes)))
        })?;

        let kind = MessageKind::parse(&wire.kind)
            .ok_or_else(|| Report::new(CodecError::UnknownKind(wire.kind.clone())))?;

        Ok(Message {
            kind,
            from: wire.from,
            clock: wire.clock,
            text: wire.text,
        })
    }
}
