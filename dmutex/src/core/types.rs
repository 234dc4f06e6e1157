//! Core type definitions for the mutual exclusion protocol
//!
//! These types are shared between the async runtime and the model checker.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// IDENTITIES
// =============================================================================

/// Identity of one process, unique among the N cooperating processes.
///
/// The derived ordering is the tie-break used by the priority rule.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ProcessId(pub u64);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

impl From<u64> for ProcessId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// A Lamport clock value.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// =============================================================================
// REQUEST KEY
// =============================================================================

/// Total-order key of a request - compares by (timestamp, process).
///
/// Lexicographic ordering via the derive; the lower key is served first.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RequestKey {
    /// Clock value at which the REQUEST was issued
    pub timestamp: Timestamp,
    /// Issuing process
    pub process: ProcessId,
}

impl RequestKey {
    #[must_use]
    pub fn new(timestamp: Timestamp, process: ProcessId) -> Self {
        Self { timestamp, process }
    }

    /// Whether this request is served before `other`.
    ///
    /// Antisymmetric for distinct keys, and every process comparing the same
    /// two keys reaches the same answer.
    #[must_use]
    pub fn has_priority_over(&self, other: &Self) -> bool {
        self < other
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

/// What a message means to the receiver.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum MessageKind {
    /// Ask every peer for permission to enter the critical section
    #[serde(rename = "REQUEST")]
    Request,
    /// Grant permission to a requesting peer
    #[serde(rename = "REPLY")]
    Reply,
    /// Notification to the shared resource that the sender entered
    #[serde(rename = "CS")]
    CriticalSection,
}

impl MessageKind {
    /// Name used on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Request => "REQUEST",
            Self::Reply => "REPLY",
            Self::CriticalSection => "CS",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A self-contained protocol message.
///
/// Every message carries the sender's clock at send time, since the
/// transport neither orders nor deduplicates. Decoding goes through
/// [`Message::decode`](crate::messages), which reports unknown kinds separately.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Message {
    #[serde(rename = "Type")]
    pub kind: MessageKind,
    #[serde(rename = "From")]
    pub from: ProcessId,
    #[serde(rename = "Clock")]
    pub clock: Timestamp,
    /// Free-form annotation, only set on `CS` notifications
    #[serde(rename = "Text", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl Message {
    #[must_use]
    pub fn request(from: ProcessId, clock: Timestamp) -> Self {
        Self {
            kind: MessageKind::Request,
            from,
            clock,
            text: None,
        }
    }

    #[must_use]
    pub fn reply(from: ProcessId, clock: Timestamp) -> Self {
        Self {
            kind: MessageKind::Reply,
            from,
            clock,
            text: None,
        }
    }

    #[must_use]
    pub fn critical_section(from: ProcessId, clock: Timestamp) -> Self {
        Self {
            kind: MessageKind::CriticalSection,
            from,
            clock,
            text: Some(format!("process {} entered the critical section", from.0)),
        }
    }
}

/// A message addressed to one peer.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Envelope {
    pub to: ProcessId,
    pub message: Message,
}
