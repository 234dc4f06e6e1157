use std::net::SocketAddr;
use std::sync::Arc;

use dmutex::{Message, ResourceNotifier, TransportError};
use error_stack::{Report, ResultExt};
use tokio::net::UdpSocket;

/// Sends each critical section notification to the resource sink.
pub struct UdpResourceNotifier {
    socket: Arc<UdpSocket>,
    resource: SocketAddr,
}

impl UdpResourceNotifier {
    #[must_use]
    pub fn new(socket: Arc<UdpSocket>, resource: SocketAddr) -> Self {
        Self { socket, resource }
    }
}

impl ResourceNotifier for UdpResourceNotifier {
    async fn notify(&self, notification: &Message) -> Result<(), Report<TransportError>> {
        let payload = notification.encode().change_context(TransportError)?;
        self.socket
            .send_to(&payload, self.resource)
            .await
            .change_context(TransportError)
            .attach_with(|| format!("notifying resource at {}", self.resource))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use dmutex::{MAX_DATAGRAM_SIZE, MessageKind, ProcessId, Timestamp};

    use super::*;

    #[tokio::test]
    async fn sink_receives_the_notification() {
        let sink = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let notifier = UdpResourceNotifier::new(socket, sink.local_addr().unwrap());

        notifier
            .notify(&Message::critical_section(ProcessId(2), Timestamp(7)))
            .await
            .unwrap();

        let mut buf = vec![0; MAX_DATAGRAM_SIZE];
        let len = sink.recv(&mut buf).await.unwrap();
        let received = Message::decode(&buf[..len]).unwrap();
        assert_eq!(received.kind, MessageKind::CriticalSection);
        assert_eq!(received.from, ProcessId(2));
        assert_eq!(received.clock, Timestamp(7));
    }
}
