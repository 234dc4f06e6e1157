//! Pure state machine core - no I/O, no async
//!
//! This module contains the protocol logic shared between:
//! - The async coordinator
//! - The Stateright model checker tests
//!
//! Both therefore exercise the exact same state transitions.
//!
//! # Modules
//!
//! - [`types`]: Identities, timestamps, the priority key and messages
//! - [`clock`]: Lamport clock (`LamportClock`)
//! - [`deferred`]: Deferred reply queue (`DeferredQueue`)
//! - [`coordinator`]: Request/reply/defer state machine (`MutexCore`)

pub mod clock;
pub mod coordinator;
pub mod deferred;
pub mod types;

pub use clock::LamportClock;
pub use coordinator::{
    Handled, IgnoreReason, MutexCore, MutexState, Phase, RequestOutcome, RequestRecord,
};
pub use deferred::DeferredQueue;
pub use types::{Envelope, Message, MessageKind, ProcessId, RequestKey, Timestamp};
