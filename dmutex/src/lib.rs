//! Distributed mutual exclusion over unreliable datagrams
//!
//! An implementation of the Ricart-Agrawala algorithm: N processes share one
//! critical section, coordinating only through REQUEST and REPLY messages
//! stamped with Lamport clocks. Concurrent requests are ordered by
//! (timestamp, process id), lower first.
//!
//! # Architecture
//!
//! - [`core`](crate::core): pure state machine (clock, deferred queue, request/reply/defer)
//! - [`MutexCoordinator`]: async wrapper that serialises access to the core,
//!   waits for quorum and performs the I/O
//! - [`run_dispatch`]: inbound loop feeding the coordinator
//! - [`run_triggers`]: local events (request the section, tick the clock)
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use dmutex::{CoordinatorConfig, MutexCoordinator, MutexCore, run_dispatch};
//!
//! let core = MutexCore::new(my_id, all_ids);
//! let coordinator = Arc::new(MutexCoordinator::new(core, transport, notifier, CoordinatorConfig::default()));
//!
//! let dispatch = Arc::clone(&coordinator);
//! tokio::spawn(async move { run_dispatch(&dispatch).await });
//!
//! coordinator.request().await?;
//! // ... critical section ...
//! coordinator.release().await;
//! ```

#![warn(clippy::pedantic)]

pub mod config;
pub mod coordinator;
pub mod core;
mod dispatch;
pub mod error;
pub mod messages;
mod traits;
mod trigger;

pub use config::CoordinatorConfig;
pub use coordinator::{Grant, MutexCoordinator, Snapshot};
pub use crate::core::{
    Envelope, Handled, IgnoreReason, Message, MessageKind, MutexCore, MutexState, Phase,
    ProcessId, RequestKey, Timestamp,
};
pub use dispatch::run_dispatch;
pub use error::{CodecError, MutexError, TransportError};
pub use messages::MAX_DATAGRAM_SIZE;
pub use traits::{ResourceNotifier, Transport};
pub use trigger::{Trigger, run_triggers};
