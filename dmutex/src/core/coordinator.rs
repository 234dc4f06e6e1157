//! Pure mutual exclusion state machine - no I/O, no async, no synchronization
//!
//! This module contains the request/reply/defer logic of Ricart-Agrawala.
//! Operations return the messages to send instead of sending them, so the
//! caller decides under its lock and performs I/O after releasing it.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::clock::LamportClock;
use super::deferred::DeferredQueue;
use super::types::{Envelope, Message, MessageKind, ProcessId, RequestKey, Timestamp};

/// An in-flight request waiting for its quorum of replies.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestRecord {
    /// Clock value at which the REQUEST was issued
    timestamp: Timestamp,
    /// N-1: self-permission is implicit
    replies_expected: usize,
    /// Peers that have replied, so a duplicated REPLY counts once
    replied: BTreeSet<ProcessId>,
}

impl RequestRecord {
    fn new(timestamp: Timestamp, replies_expected: usize) -> Self {
        Self {
            timestamp,
            replies_expected,
            replied: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    #[must_use]
    pub fn replies_expected(&self) -> usize {
        self.replies_expected
    }

    #[must_use]
    pub fn replies_received(&self) -> usize {
        self.replied.len()
    }

    #[must_use]
    pub fn has_quorum(&self) -> bool {
        self.replies_received() >= self.replies_expected
    }
}

/// Local claim on the critical section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MutexState {
    #[default]
    Idle,
    Requesting(RequestRecord),
    InCriticalSection {
        /// Timestamp of the request that was granted
        timestamp: Timestamp,
    },
}

impl MutexState {
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::Requesting(_) => Phase::Requesting,
            Self::InCriticalSection { .. } => Phase::InCriticalSection,
        }
    }
}

/// Data-free view of [`MutexState`], for logs and assertions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Idle,
    Requesting,
    InCriticalSection,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Requesting => "requesting",
            Self::InCriticalSection => "in critical section",
        })
    }
}

/// Result of [`MutexCore::request`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A new request was issued; `request` must be sent to every peer
    Issued {
        request: Message,
        /// Set when there are no peers to ask: the critical section was
        /// entered immediately and this is the resource notification
        entered: Option<Message>,
    },
    /// Not idle, so the trigger was dropped without side effects
    Dropped { phase: Phase },
}

/// Why an inbound message caused no protocol action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Sender is this process or not one of the known peers
    UnknownSender(ProcessId),
    /// `CS` notifications are for the resource sink only
    Notification,
    /// REPLY while not requesting
    StrayReply,
    /// REPLY not causally after the pending REQUEST
    StaleReply,
    /// Second REPLY from the same peer for the pending REQUEST
    DuplicateReply,
    /// REQUEST no newer than one already seen from that peer
    DuplicateRequest,
}

/// Result of [`MutexCore::handle`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Handled {
    /// Answer the REQUEST now
    Reply(Envelope),
    /// REPLY withheld until release
    Deferred(ProcessId),
    /// REPLY recorded, quorum not yet complete
    Counted { received: usize, expected: usize },
    /// Last REPLY recorded: the critical section was entered and the
    /// resource sink should receive `notification`
    Entered { notification: Message },
    Ignored(IgnoreReason),
}

/// Pure per-process protocol state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MutexCore {
    id: ProcessId,
    /// Every other process, sorted
    peers: Vec<ProcessId>,
    clock: LamportClock,
    state: MutexState,
    deferred: DeferredQueue,
    /// Newest REQUEST timestamp seen per peer. A peer's clock never goes
    /// back, so anything at or below it is a redelivered copy.
    latest_request: BTreeMap<ProcessId, Timestamp>,
}

impl MutexCore {
    /// `peers` may include `id` itself; it is filtered out.
    #[must_use]
    pub fn new(id: ProcessId, peers: impl IntoIterator<Item = ProcessId>) -> Self {
        let peers: BTreeSet<ProcessId> = peers.into_iter().filter(|p| *p != id).collect();
        Self {
            id,
            peers: peers.into_iter().collect(),
            clock: LamportClock::new(),
            state: MutexState::Idle,
            deferred: DeferredQueue::new(),
            latest_request: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    #[must_use]
    pub fn peers(&self) -> &[ProcessId] {
        &self.peers
    }

    #[must_use]
    pub fn clock(&self) -> Timestamp {
        self.clock.now()
    }

    #[must_use]
    pub fn state(&self) -> &MutexState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    #[must_use]
    pub fn deferred(&self) -> &DeferredQueue {
        &self.deferred
    }

    /// Peers whose REPLY to the pending request has not arrived.
    #[must_use]
    pub fn missing_replies(&self) -> Vec<ProcessId> {
        match &self.state {
            MutexState::Requesting(record) => self
                .peers
                .iter()
                .copied()
                .filter(|p| !record.replied.contains(p))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Advance the clock for a local event that is not a request.
    pub fn local_tick(&mut self) -> Timestamp {
        self.clock.tick()
    }

    /// Issue a new request. Only legal from `Idle`; otherwise a no-op.
    pub fn request(&mut self) -> RequestOutcome {
        if !matches!(self.state, MutexState::Idle) {
            return RequestOutcome::Dropped {
                phase: self.phase(),
            };
        }

        let timestamp = self.clock.tick();
        let record = RequestRecord::new(timestamp, self.peers.len());
        let request = Message::request(self.id, timestamp);

        if record.has_quorum() {
            self.state = MutexState::InCriticalSection { timestamp };
            return RequestOutcome::Issued {
                request,
                entered: Some(Message::critical_section(self.id, self.clock.now())),
            };
        }

        self.state = MutexState::Requesting(record);
        RequestOutcome::Issued {
            request,
            entered: None,
        }
    }

    /// Handle an inbound message - pure state transition
    ///
    /// The clock is merged before anything else for every REQUEST and REPLY
    /// from a known peer.
    pub fn handle(&mut self, msg: &Message) -> Handled {
        if msg.from == self.id || self.peers.binary_search(&msg.from).is_err() {
            return Handled::Ignored(IgnoreReason::UnknownSender(msg.from));
        }

        match msg.kind {
            MessageKind::Request => {
                self.clock.merge(msg.clock);
                if self
                    .latest_request
                    .get(&msg.from)
                    .is_some_and(|&seen| msg.clock <= seen)
                {
                    return Handled::Ignored(IgnoreReason::DuplicateRequest);
                }
                self.latest_request.insert(msg.from, msg.clock);
                self.handle_request(msg.from, msg.clock)
            }
            MessageKind::Reply => {
                self.clock.merge(msg.clock);
                self.handle_reply(msg.from, msg.clock)
            }
            MessageKind::CriticalSection => Handled::Ignored(IgnoreReason::Notification),
        }
    }

    fn handle_request(&mut self, from: ProcessId, timestamp: Timestamp) -> Handled {
        let incoming = RequestKey::new(timestamp, from);

        // Compare against the pending claim's timestamp, never the current
        // clock: merges have already moved the clock past it.
        let defer = match &self.state {
            MutexState::Idle => false,
            MutexState::Requesting(record) => {
                let local = RequestKey::new(record.timestamp, self.id);
                !incoming.has_priority_over(&local)
            }
            MutexState::InCriticalSection { .. } => true,
        };

        if defer {
            self.deferred.append(from);
            Handled::Deferred(from)
        } else {
            Handled::Reply(Envelope {
                to: from,
                message: Message::reply(self.id, self.clock.now()),
            })
        }
    }

    fn handle_reply(&mut self, from: ProcessId, timestamp: Timestamp) -> Handled {
        let MutexState::Requesting(record) = &mut self.state else {
            return Handled::Ignored(IgnoreReason::StrayReply);
        };

        // The peer merged our REQUEST before replying, so a genuine reply is
        // stamped strictly after it.
        if timestamp <= record.timestamp {
            return Handled::Ignored(IgnoreReason::StaleReply);
        }
        if !record.replied.insert(from) {
            return Handled::Ignored(IgnoreReason::DuplicateReply);
        }

        if record.has_quorum() {
            let timestamp = record.timestamp;
            self.state = MutexState::InCriticalSection { timestamp };
            Handled::Entered {
                notification: Message::critical_section(self.id, self.clock.now()),
            }
        } else {
            Handled::Counted {
                received: record.replies_received(),
                expected: record.replies_expected(),
            }
        }
    }

    /// Leave the critical section.
    ///
    /// Returns one REPLY per deferred peer, in the order they were deferred,
    /// or `None` if not in the critical section.
    pub fn release(&mut self) -> Option<Vec<Envelope>> {
        if !matches!(self.state, MutexState::InCriticalSection { .. }) {
            return None;
        }
        self.state = MutexState::Idle;

        let reply = Message::reply(self.id, self.clock.now());
        Some(
            self.deferred
                .drain_all()
                .into_iter()
                .map(|to| Envelope {
                    to,
                    message: reply.clone(),
                })
                .collect(),
        )
    }
}
