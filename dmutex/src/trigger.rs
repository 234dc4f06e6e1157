//! Local trigger events.

use std::pin::pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::coordinator::{Grant, MutexCoordinator};
use crate::traits::{ResourceNotifier, Transport};

/// An event that drives the local process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Request the critical section, hold it, release it
    RequestCs,
    /// Advance the clock without requesting
    LocalTick,
}

/// Apply triggers until the stream ends, then wait for running critical
/// section flows to finish.
///
/// Each `RequestCs` runs on its own task so the next trigger is handled
/// immediately: one that arrives while a request is in flight reaches the
/// coordinator and is dropped there.
#[instrument(skip_all, name = "triggers", fields(id = %coordinator.id()))]
pub async fn run_triggers<T, N, S>(coordinator: Arc<MutexCoordinator<T, N>>, triggers: S)
where
    T: Transport,
    N: ResourceNotifier,
    S: Stream<Item = Trigger>,
{
    let mut triggers = pin!(triggers);
    let mut flows = JoinSet::new();

    while let Some(trigger) = triggers.next().await {
        match trigger {
            Trigger::RequestCs => {
                let coordinator = Arc::clone(&coordinator);
                flows.spawn(async move {
                    match coordinator.run_critical_section().await {
                        Ok(Grant::Entered { timestamp }) => {
                            debug!(%timestamp, "critical section done");
                        }
                        Ok(Grant::Dropped { phase }) => {
                            info!(%phase, "already busy, request ignored");
                        }
                        Err(error) => warn!(?error, "critical section request failed"),
                    }
                });
            }
            Trigger::LocalTick => {
                let clock = coordinator.local_tick();
                info!(%clock, "local event");
            }
        }

        while let Some(result) = flows.try_join_next() {
            if let Err(error) = result {
                warn!(?error, "critical section task failed");
            }
        }
    }

    debug!("trigger stream ended");
    while let Some(result) = flows.join_next().await {
        if let Err(error) = result {
            warn!(?error, "critical section task failed");
        }
    }
}
