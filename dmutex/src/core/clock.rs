//! Lamport logical clock

use super::types::Timestamp;

/// Scalar logical clock. Never decreases.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct LamportClock {
    now: Timestamp,
}

impl LamportClock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an arbitrary value.
    #[must_use]
    pub fn starting_at(now: Timestamp) -> Self {
        Self { now }
    }

    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Local event: advance by exactly one, saturating at `u64::MAX`.
    pub fn tick(&mut self) -> Timestamp {
        self.now = Timestamp(self.now.0.saturating_add(1));
        self.now
    }

    /// Receive event: `max(local, remote) + 1`, saturating at `u64::MAX`.
    ///
    /// `remote` comes off the wire, so any value is possible.
    pub fn merge(&mut self, remote: Timestamp) -> Timestamp {
        self.now = Timestamp(self.now.0.max(remote.0).saturating_add(1));
        self.now
    }
}
