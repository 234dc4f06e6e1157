//! Inbound dispatch loop.

use tracing::{debug, instrument, trace, warn};

use crate::coordinator::MutexCoordinator;
use crate::core::Message;
use crate::error::CodecError;
use crate::traits::{ResourceNotifier, Transport};

/// Receive, decode and apply inbound messages until the transport closes.
///
/// Per-message failures are logged and never end the loop. An undecodable
/// datagram is discarded before anything touches the clock. Also sends the
/// REPLYs owed by a `request` that was dropped inside the critical section.
#[instrument(skip_all, name = "dispatch", fields(id = %coordinator.id()))]
pub async fn run_dispatch<T, N>(coordinator: &MutexCoordinator<T, N>)
where
    T: Transport,
    N: ResourceNotifier,
{
    debug!("dispatch loop started");

    loop {
        let received = tokio::select! {
            received = coordinator.transport().recv() => received,
            () = coordinator.outbox_pending() => {
                coordinator.flush_outbox().await;
                continue;
            }
        };

        let payload = match received {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("transport closed");
                return;
            }
            Err(error) => {
                warn!(?error, "receive failed");
                continue;
            }
        };

        let message = match Message::decode(&payload) {
            Ok(message) => message,
            Err(error) => {
                if let CodecError::UnknownKind(kind) = error.current_context() {
                    warn!(%kind, "discarding message of unknown type");
                } else {
                    warn!(?error, "discarding undecodable message");
                }
                continue;
            }
        };

        trace!(kind = %message.kind, from = %message.from, clock = %message.clock, "received");
        coordinator.handle_message(message).await;
    }
}
