//! Async coordinator around [`MutexCore`].
//!
//! Every state mutation happens under one `std::sync::Mutex`, and the lock is
//! never held across an `.await`. Decisions (defer or reply, and the exact
//! timestamp to send) are taken under the lock and copied out as `Message`
//! values; the network write happens after the lock is released.

use std::sync::Mutex;

use error_stack::Report;
use futures::future::join_all;
use tokio::sync::{Notify, oneshot};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::CoordinatorConfig;
use crate::core::{
    Envelope, Handled, IgnoreReason, Message, MutexCore, Phase, ProcessId, RequestOutcome,
    Timestamp,
};
use crate::error::MutexError;
use crate::traits::{ResourceNotifier, Transport};

/// Outcome of [`MutexCoordinator::request`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    /// The critical section is held; call [`MutexCoordinator::release`]
    Entered {
        /// Timestamp of the granted request
        timestamp: Timestamp,
    },
    /// A request was already in flight or the section already held
    Dropped { phase: Phase },
}

/// Point-in-time copy of the protocol state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: ProcessId,
    pub clock: Timestamp,
    pub phase: Phase,
    pub deferred: Vec<ProcessId>,
    pub missing_replies: Vec<ProcessId>,
}

struct Inner {
    core: MutexCore,
    /// Fulfilled by whichever handler records the last REPLY
    quorum: Option<oneshot::Sender<Message>>,
    /// The caller of `request` went away while waiting: release as soon as
    /// the quorum completes
    abandoned: bool,
    /// REPLYs owed after a release that happened outside any async context
    outbox: Vec<Envelope>,
}

enum Pending {
    Entered(Message),
    Waiting(oneshot::Receiver<Message>),
}

/// One per process. Share it with `Arc` between the dispatch loop and the
/// trigger loop.
pub struct MutexCoordinator<T, N = ()> {
    id: ProcessId,
    inner: Mutex<Inner>,
    transport: T,
    notifier: N,
    config: CoordinatorConfig,
    /// Wakes the dispatch loop when `outbox` has REPLYs to send
    outbox_ready: Notify,
}

/// Armed while a `request` future owns an issued request. Dropping it early
/// hands the request back so the section is never left held.
struct RequestGuard<'a> {
    inner: &'a Mutex<Inner>,
    outbox_ready: &'a Notify,
    armed: bool,
}

impl RequestGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.quorum = None;
        match inner.core.phase() {
            Phase::Requesting => {
                warn!("request abandoned, releasing once replies arrive");
                inner.abandoned = true;
            }
            Phase::InCriticalSection => {
                warn!("request abandoned inside critical section, releasing");
                if let Some(replies) = inner.core.release() {
                    inner.outbox.extend(replies);
                    self.outbox_ready.notify_one();
                }
            }
            Phase::Idle => {}
        }
    }
}

impl<T, N> MutexCoordinator<T, N>
where
    T: Transport,
    N: ResourceNotifier,
{
    pub fn new(core: MutexCore, transport: T, notifier: N, config: CoordinatorConfig) -> Self {
        Self {
            id: core.id(),
            inner: Mutex::new(Inner {
                core,
                quorum: None,
                abandoned: false,
                outbox: Vec::new(),
            }),
            transport,
            notifier,
            config,
            outbox_ready: Notify::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.lock().unwrap();
        Snapshot {
            id: self.id,
            clock: inner.core.clock(),
            phase: inner.core.phase(),
            deferred: inner.core.deferred().iter().collect(),
            missing_replies: inner.core.missing_replies(),
        }
    }

    /// Advance the clock without requesting.
    pub fn local_tick(&self) -> Timestamp {
        self.inner.lock().unwrap().core.local_tick()
    }

    /// Request the critical section and wait until every peer has replied.
    ///
    /// Returns [`Grant::Dropped`] without side effects when not idle. There
    /// is no timeout: a peer that never replies stalls this call.
    ///
    /// An issued request cannot be withdrawn. Dropping the future (say under
    /// `tokio::time::timeout`) does not cancel it: the section is entered
    /// when the last REPLY arrives and released straight away, and the
    /// deferred REPLYs go out through [`run_dispatch`](crate::run_dispatch).
    #[instrument(skip_all, name = "request", fields(id = %self.id))]
    pub async fn request(&self) -> Result<Grant, Report<MutexError>> {
        let (request, pending) = {
            let mut inner = self.inner.lock().unwrap();
            match inner.core.request() {
                RequestOutcome::Dropped { phase } => {
                    debug!(%phase, "request dropped");
                    return Ok(Grant::Dropped { phase });
                }
                RequestOutcome::Issued {
                    request,
                    entered: Some(notification),
                } => (request, Pending::Entered(notification)),
                RequestOutcome::Issued {
                    request,
                    entered: None,
                } => {
                    let (tx, rx) = oneshot::channel();
                    inner.quorum = Some(tx);
                    (request, Pending::Waiting(rx))
                }
            }
        };

        let guard = RequestGuard {
            inner: &self.inner,
            outbox_ready: &self.outbox_ready,
            armed: true,
        };

        let timestamp = request.clock;
        debug!(%timestamp, "broadcasting request");
        self.broadcast(&request).await;

        let notification = match pending {
            Pending::Entered(notification) => notification,
            Pending::Waiting(rx) => self.wait_for_quorum(rx).await?,
        };

        info!(%timestamp, clock = %notification.clock, "entered critical section");
        if let Err(error) = self.notifier.notify(&notification).await {
            warn!(?error, "failed to notify resource");
        }

        guard.disarm();
        Ok(Grant::Entered { timestamp })
    }

    async fn wait_for_quorum(
        &self,
        mut rx: oneshot::Receiver<Message>,
    ) -> Result<Message, Report<MutexError>> {
        let dropped = || Report::new(MutexError).attach("quorum signal dropped");

        let Some(period) = self.config.stall_warning else {
            return rx.await.map_err(|_| dropped());
        };

        loop {
            match tokio::time::timeout(period, &mut rx).await {
                Ok(Ok(notification)) => return Ok(notification),
                Ok(Err(_)) => return Err(dropped()),
                Err(_) => {
                    let missing = self.inner.lock().unwrap().core.missing_replies();
                    warn!(?missing, "still waiting for replies");
                }
            }
        }
    }

    /// Leave the critical section and send every deferred REPLY.
    ///
    /// Returns `false` (and does nothing) when not in the critical section.
    #[instrument(skip_all, name = "release", fields(id = %self.id))]
    pub async fn release(&self) -> bool {
        let replies = self.inner.lock().unwrap().core.release();
        let Some(replies) = replies else {
            debug!("not in critical section, nothing to release");
            return false;
        };

        info!(deferred = replies.len(), "left critical section");
        join_all(replies.into_iter().map(|envelope| self.send(envelope))).await;
        true
    }

    /// Request, occupy the section for the configured hold time, release.
    pub async fn run_critical_section(&self) -> Result<Grant, Report<MutexError>> {
        let grant = self.request().await?;
        if let Grant::Entered { .. } = grant {
            tokio::time::sleep(self.config.hold).await;
            self.release().await;
        }
        Ok(grant)
    }

    /// Apply one inbound message.
    pub async fn handle_message(&self, message: Message) -> Handled {
        let (handled, released) = {
            let mut inner = self.inner.lock().unwrap();
            let handled = inner.core.handle(&message);
            let mut released = None;
            if let Handled::Entered { notification } = &handled {
                if let Some(quorum) = inner.quorum.take() {
                    let _ = quorum.send(notification.clone());
                } else if inner.abandoned {
                    inner.abandoned = false;
                    released = inner.core.release();
                }
            }
            (handled, released)
        };

        if let Some(replies) = released {
            info!(
                deferred = replies.len(),
                "abandoned request reached quorum, released"
            );
            join_all(replies.into_iter().map(|envelope| self.send(envelope))).await;
        }

        match &handled {
            Handled::Reply(envelope) => {
                trace!(to = %envelope.to, clock = %envelope.message.clock, "replying");
                self.send(envelope.clone()).await;
            }
            Handled::Deferred(peer) => debug!(%peer, "reply deferred"),
            Handled::Counted { received, expected } => {
                trace!(from = %message.from, received, expected, "reply counted");
            }
            Handled::Entered { .. } => debug!(from = %message.from, "quorum reached"),
            Handled::Ignored(
                reason @ (IgnoreReason::UnknownSender(_) | IgnoreReason::Notification),
            ) => {
                warn!(?reason, kind = %message.kind, "discarding message");
            }
            Handled::Ignored(reason) => {
                debug!(?reason, from = %message.from, kind = %message.kind, "ignoring message");
            }
        }

        handled
    }

    /// Wait until a release outside any async context left REPLYs to send.
    pub(crate) async fn outbox_pending(&self) {
        self.outbox_ready.notified().await;
    }

    /// Send REPLYs left behind by an abandoned request.
    pub(crate) async fn flush_outbox(&self) {
        let replies = std::mem::take(&mut self.inner.lock().unwrap().outbox);
        if replies.is_empty() {
            return;
        }
        debug!(count = replies.len(), "flushing replies owed by abandoned request");
        join_all(replies.into_iter().map(|envelope| self.send(envelope))).await;
    }

    async fn broadcast(&self, message: &Message) {
        let peers = self.inner.lock().unwrap().core.peers().to_vec();
        join_all(peers.into_iter().map(|to| {
            self.send(Envelope {
                to,
                message: message.clone(),
            })
        }))
        .await;
    }

    async fn send(&self, envelope: Envelope) {
        let payload = match envelope.message.encode() {
            Ok(payload) => payload,
            Err(error) => {
                warn!(?error, "failed to encode message");
                return;
            }
        };
        if let Err(error) = self.transport.send(envelope.to, payload).await {
            warn!(to = %envelope.to, kind = %envelope.message.kind, ?error, "send failed");
        }
    }
}
