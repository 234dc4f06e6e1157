//! UDP datagram transport.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use dmutex::{MAX_DATAGRAM_SIZE, ProcessId, Transport, TransportError};
use error_stack::{Report, ResultExt};
use tokio::net::UdpSocket;
use tracing::trace;

use crate::error::NodeError;
use crate::notifier::UdpResourceNotifier;

/// One bound socket, used both to receive and to reach every peer.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    peers: HashMap<ProcessId, SocketAddr>,
}

impl UdpTransport {
    /// # Errors
    ///
    /// Fails when the address cannot be bound.
    pub async fn bind(
        addr: SocketAddr,
        peers: HashMap<ProcessId, SocketAddr>,
    ) -> Result<Self, Report<NodeError>> {
        let socket = UdpSocket::bind(addr)
            .await
            .change_context(NodeError)
            .attach_with(|| format!("cannot bind {addr}"))?;
        Ok(Self {
            socket: Arc::new(socket),
            peers,
        })
    }

    /// # Errors
    ///
    /// Fails if the socket has no local address.
    pub fn local_addr(&self) -> Result<SocketAddr, Report<NodeError>> {
        self.socket.local_addr().change_context(NodeError)
    }

    /// A notifier that sends from this same socket.
    #[must_use]
    pub fn notifier(&self, resource: SocketAddr) -> UdpResourceNotifier {
        UdpResourceNotifier::new(Arc::clone(&self.socket), resource)
    }
}

impl Transport for UdpTransport {
    async fn send(&self, to: ProcessId, payload: Vec<u8>) -> Result<(), Report<TransportError>> {
        let Some(&addr) = self.peers.get(&to) else {
            return Err(Report::new(TransportError).attach(format!("no address for {to}")));
        };
        self.socket
            .send_to(&payload, addr)
            .await
            .change_context(TransportError)
            .attach_with(|| format!("sending to {to} at {addr}"))?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Report<TransportError>> {
        let mut buf = vec![0; MAX_DATAGRAM_SIZE];
        let (len, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .change_context(TransportError)?;
        trace!(%from, len, "datagram received");
        buf.truncate(len);
        Ok(Some(buf))
    }
}
