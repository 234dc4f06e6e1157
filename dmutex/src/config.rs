//! Coordinator configuration

use std::time::Duration;

/// Configuration for a [`MutexCoordinator`](crate::MutexCoordinator)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// How long `run_critical_section` occupies the section before releasing
    pub hold: Duration,
    /// While waiting for replies, log the missing peers this often.
    /// The wait itself never times out.
    pub stall_warning: Option<Duration>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            hold: Duration::from_secs(1),
            stall_warning: Some(Duration::from_secs(5)),
        }
    }
}

impl CoordinatorConfig {
    #[must_use]
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    #[must_use]
    pub fn with_stall_warning(mut self, stall_warning: Option<Duration>) -> Self {
        self.stall_warning = stall_warning;
        self
    }
}
