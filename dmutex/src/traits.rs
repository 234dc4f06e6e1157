//! Seams to the outside world: datagram transport and the resource sink.

use std::future::Future;
use std::sync::Arc;

use error_stack::Report;

use crate::core::{Message, ProcessId};
use crate::error::TransportError;

/// Unordered, unreliable point-to-point delivery between the known peers.
///
/// Both methods take `&self`: the dispatch loop receives while the request
/// flow sends.
pub trait Transport: Send + Sync + 'static {
    /// Send one datagram to `to`. No acknowledgment, no retransmission.
    fn send(
        &self,
        to: ProcessId,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), Report<TransportError>>> + Send;

    /// Next inbound datagram, or `None` once the transport is closed.
    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, Report<TransportError>>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(
        &self,
        to: ProcessId,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), Report<TransportError>>> + Send {
        T::send(self, to, payload)
    }

    fn recv(&self) -> impl Future<Output = Result<Option<Vec<u8>>, Report<TransportError>>> + Send {
        T::recv(self)
    }
}

/// Passive sink told about every critical section entry. Fire-and-forget.
pub trait ResourceNotifier: Send + Sync + 'static {
    fn notify(
        &self,
        notification: &Message,
    ) -> impl Future<Output = Result<(), Report<TransportError>>> + Send;
}

/// No sink.
impl ResourceNotifier for () {
    async fn notify(&self, _notification: &Message) -> Result<(), Report<TransportError>> {
        Ok(())
    }
}
