//! Error types. Use `error_stack::Report<_>` with attachments for details.

use std::fmt;

/// Sending or receiving one datagram failed.
#[derive(Debug)]
pub struct TransportError;

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("transport operation failed")
    }
}

impl std::error::Error for TransportError {}

/// A datagram could not be turned into a [`Message`](crate::Message) or back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Not a JSON message with the expected fields
    Malformed,
    /// Well-formed, but the `Type` is not one this protocol knows
    UnknownKind(String),
    /// Encoded size exceeds a single datagram
    Oversized(usize),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Malformed => f.write_str("malformed message"),
            CodecError::UnknownKind(kind) => write!(f, "unknown message type: {kind:?}"),
            CodecError::Oversized(len) => write!(f, "message of {len} bytes exceeds one datagram"),
        }
    }
}

impl std::error::Error for CodecError {}

/// The coordinator could not complete an operation.
#[derive(Debug)]
pub struct MutexError;

impl fmt::Display for MutexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("mutual exclusion operation failed")
    }
}

impl std::error::Error for MutexError {}
